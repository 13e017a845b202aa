// Message templates.
//
// Messages are a pure function of the notification kind: a fixed template
// per tier for first notifications, and one upgrade template filled with
// the tier pair. `{url}` is replaced with the claim or view link.

use crate::scoring::Tier;

use super::NotificationKind;

const MINTED_TEMPLATES: [(Tier, &str); 3] = [
    (
        Tier::Rising,
        "Congratulations! Your post just went viral and we've preserved it as a collectible \
         on Solana.\n\nClaim it here: {url}\n\nNo crypto experience needed, we'll guide you through it.",
    ),
    (
        Tier::Trending,
        "Your post is trending! We've preserved it as a collectible on Solana.\n\n\
         Claim it here: {url}\n\nNo crypto experience needed, we'll guide you through it.",
    ),
    (
        Tier::Viral,
        "WOW! Your post has gone mega-viral and we've preserved it as a collectible on Solana.\n\n\
         Claim it here: {url}\n\nNo crypto experience needed, we'll guide you through it.",
    ),
];

const UPGRADE_TEMPLATE: &str = "Your content is gaining momentum!\n\n\
     Your {old} post has been upgraded to {new}!\n\n\
     This increases its value and visibility. View it here: {url}";

/// Link sent with a notification: claim page for first mints, asset page
/// for upgrades.
pub fn link_for(kind: NotificationKind, claim_base_url: &str, asset_address: &str) -> String {
    let base = claim_base_url.trim_end_matches('/');
    match kind {
        NotificationKind::Minted(_) => format!("{base}/claim/{asset_address}"),
        NotificationKind::Upgraded { .. } => format!("{base}/nft/{asset_address}"),
    }
}

pub fn render(kind: NotificationKind, url: &str) -> String {
    match kind {
        NotificationKind::Minted(tier) => {
            // Tier 0 never gets minted; fall back to the lowest template.
            let template = MINTED_TEMPLATES
                .iter()
                .find(|(t, _)| *t == tier)
                .map(|(_, text)| *text)
                .unwrap_or(MINTED_TEMPLATES[0].1);
            template.replace("{url}", url)
        }
        NotificationKind::Upgraded { from, to } => UPGRADE_TEMPLATE
            .replace("{old}", from.as_str())
            .replace("{new}", to.as_str())
            .replace("{url}", url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_tier_has_its_own_message() {
        let rising = render(NotificationKind::Minted(Tier::Rising), "u");
        let viral = render(NotificationKind::Minted(Tier::Viral), "u");
        assert_ne!(rising, viral);
        assert!(viral.contains("mega-viral"));
    }

    #[test]
    fn test_upgrade_message_names_both_tiers() {
        let kind = NotificationKind::Upgraded {
            from: Tier::Rising,
            to: Tier::Viral,
        };
        let text = render(kind, "https://solspace.app/nft/abc");
        assert!(text.contains("Your Rising post has been upgraded to Viral!"));
        assert!(text.ends_with("https://solspace.app/nft/abc"));
    }

    #[test]
    fn test_links() {
        let minted = link_for(NotificationKind::Minted(Tier::Rising), "https://solspace.app/", "A1");
        assert_eq!(minted, "https://solspace.app/claim/A1");
        let upgraded = link_for(
            NotificationKind::Upgraded {
                from: Tier::Rising,
                to: Tier::Trending,
            },
            "https://solspace.app",
            "A1",
        );
        assert_eq!(upgraded, "https://solspace.app/nft/A1");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let kind = NotificationKind::Minted(Tier::Trending);
        assert_eq!(render(kind, "x"), render(kind, "x"));
    }
}
