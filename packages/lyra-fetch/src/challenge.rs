use serde::{Deserialize, Serialize};

/// Classification of a blocked or suspicious response (spec 4.4 step 4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeKind {
    CaptchaProvider { provider: String },
    LoginGate,
    RateLimited,
    BotSuspected,
}

/// A minimal, body-and-status based challenge detector. Patterns are
/// necessarily heuristic; production deployments extend the signature list
/// via the same engine/parser config file that declares CAPTCHA selectors
/// for C5.
pub fn detect_challenge(status: u16, body: &str) -> Option<ChallengeKind> {
    let lower = body.to_lowercase();

    if lower.contains("cf-chl") || lower.contains("cloudflare") && lower.contains("challenge") {
        return Some(ChallengeKind::CaptchaProvider {
            provider: "cloudflare".to_string(),
        });
    }
    if lower.contains("recaptcha") {
        return Some(ChallengeKind::CaptchaProvider {
            provider: "recaptcha".to_string(),
        });
    }
    if lower.contains("hcaptcha") {
        return Some(ChallengeKind::CaptchaProvider {
            provider: "hcaptcha".to_string(),
        });
    }
    if status == 401 || lower.contains("please log in") || lower.contains("sign in to continue") {
        return Some(ChallengeKind::LoginGate);
    }
    if status == 429 {
        return Some(ChallengeKind::RateLimited);
    }
    if status == 403 && (lower.contains("bot") || lower.contains("automated")) {
        return Some(ChallengeKind::BotSuspected);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_recaptcha() {
        let body = "<div class=\"g-recaptcha\"></div>";
        assert_eq!(
            detect_challenge(200, body),
            Some(ChallengeKind::CaptchaProvider {
                provider: "recaptcha".to_string()
            })
        );
    }

    #[test]
    fn detects_rate_limited_status() {
        assert_eq!(detect_challenge(429, ""), Some(ChallengeKind::RateLimited));
    }

    #[test]
    fn detects_login_gate() {
        assert_eq!(
            detect_challenge(401, "Please log in to view this page"),
            Some(ChallengeKind::LoginGate)
        );
    }

    #[test]
    fn clean_page_has_no_challenge() {
        assert_eq!(detect_challenge(200, "<html><body>Hello</body></html>"), None);
    }
}
