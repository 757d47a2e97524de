use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::RequestBuilder;

/// Frontend version token sent with every upstream request.
const FE_VERSION: &str = "prod-fe-1.0.70";

/// Browser header sets the relay rotates through.
///
/// Each set mimics one real browser so upstream traffic inspection sees a
/// consistent UA / client-hint combination per request.
const BROWSER_PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
        sec_ch_ua: "\"Chromium\";v=\"139\", \"Google Chrome\";v=\"139\", \"Not;A=Brand\";v=\"99\"",
        sec_ch_ua_platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
        sec_ch_ua: "\"Chromium\";v=\"139\", \"Google Chrome\";v=\"139\", \"Not;A=Brand\";v=\"99\"",
        sec_ch_ua_platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        sec_ch_ua: "\"Chromium\";v=\"138\", \"Google Chrome\";v=\"138\", \"Not;A=Brand\";v=\"99\"",
        sec_ch_ua_platform: "\"Linux\"",
    },
];

struct BrowserProfile {
    user_agent: &'static str,
    sec_ch_ua: &'static str,
    sec_ch_ua_platform: &'static str,
}

/// Rotating pool of browser-identical request headers.
#[derive(Debug, Default)]
pub(crate) struct HeaderPool {
    next: AtomicUsize,
}

impl HeaderPool {
    /// Attach the next header set in the rotation to a request.
    pub(crate) fn apply(&self, builder: RequestBuilder, origin: &str) -> RequestBuilder {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % BROWSER_PROFILES.len();
        let profile = &BROWSER_PROFILES[index];

        builder
            .header("User-Agent", profile.user_agent)
            .header("sec-ch-ua", profile.sec_ch_ua)
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", profile.sec_ch_ua_platform)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("X-FE-Version", FE_VERSION)
            .header("Origin", origin)
            .header("Referer", format!("{origin}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycles_through_profiles() {
        let pool = HeaderPool::default();

        let picks: Vec<usize> = (0..BROWSER_PROFILES.len() + 1)
            .map(|_| pool.next.fetch_add(1, Ordering::Relaxed) % BROWSER_PROFILES.len())
            .collect();

        assert_eq!(picks[0], 0);
        assert_eq!(picks[BROWSER_PROFILES.len()], 0);
    }
}
