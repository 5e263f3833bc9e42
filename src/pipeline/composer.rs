//! Outbound text rendering.

use rand::Rng;

use crate::pipeline::types::Rule;

/// Prefix of a public reminder built from a rule.
pub const FILLER_PREFIX: &str = "Recordatorio:";

/// Self-introduction used for friendly fillers.
pub const FRIENDLY_INTRO: &str =
    "¡Hola! Soy un bot que recuerda, con cariño, cómo se escriben algunas palabras.";

/// Trailing glyphs for fillers. The empty entry leaves the post undecorated.
pub const DECORATIONS: &[&str] = &["", "✍", "✎", "✓", "☺", "♥", "★"];

/// Stateless formatter for replies and fillers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplyComposer;

impl ReplyComposer {
    pub fn new() -> Self {
        Self
    }

    /// `@{screen_name} {message}`.
    pub fn compose_reply(&self, screen_name: &str, rule: &Rule) -> String {
        format!("@{} {}", screen_name, rule.reply_message)
    }

    pub fn compose_filler_from_rule(&self, rule: &Rule, decoration: &str) -> String {
        decorate(format!("{FILLER_PREFIX} {}", rule.reply_message), decoration)
    }

    pub fn compose_filler_friendly(&self, decoration: &str) -> String {
        decorate(FRIENDLY_INTRO.to_string(), decoration)
    }

    /// Draw a decoration from [`DECORATIONS`].
    pub fn pick_decoration<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        DECORATIONS[rng.gen_range(0..DECORATIONS.len())]
    }
}

fn decorate(mut text: String, decoration: &str) -> String {
    if !decoration.is_empty() {
        text.push(' ');
        text.push_str(decoration);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rule() -> Rule {
        Rule::new("tí", "X", "es")
    }

    #[test]
    fn reply_is_exact() {
        assert_eq!(ReplyComposer::new().compose_reply("ana", &rule()), "@ana X");
    }

    #[test]
    fn filler_from_rule_without_decoration() {
        assert_eq!(
            ReplyComposer::new().compose_filler_from_rule(&rule(), ""),
            "Recordatorio: X"
        );
    }

    #[test]
    fn filler_from_rule_with_decoration() {
        assert_eq!(
            ReplyComposer::new().compose_filler_from_rule(&rule(), "✓"),
            "Recordatorio: X ✓"
        );
    }

    #[test]
    fn friendly_filler() {
        let composer = ReplyComposer::new();
        assert_eq!(composer.compose_filler_friendly(""), FRIENDLY_INTRO);
        assert!(composer.compose_filler_friendly("★").ends_with(" ★"));
    }

    #[test]
    fn decoration_is_sometimes_absent() {
        let composer = ReplyComposer::new();
        let mut rng = StdRng::seed_from_u64(11);
        let picks: Vec<_> = (0..500).map(|_| composer.pick_decoration(&mut rng)).collect();
        assert!(picks.iter().any(|d| d.is_empty()));
        assert!(picks.iter().any(|d| !d.is_empty()));
        assert!(picks.iter().all(|d| DECORATIONS.contains(d)));
    }
}
