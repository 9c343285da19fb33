//! Prompts for the creative director.

use schemars::schema_for;
use station_models::CreativeConcept;

use crate::config::MarketingLinks;

pub const USER_PROMPT: &str = "Genera un nuevo concepto para ahora mismo. Sorpréndeme.";

/// System prompt with the JSON schema of [`CreativeConcept`] embedded.
pub fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&schema_for!(CreativeConcept)).unwrap_or_default();

    format!(
        r#"Eres el Director Creativo de "Relax Station", una radio de Lofi Hip Hop 24/7.
Tu trabajo es INVENTAR un escenario único para un stream de 12 horas.

1. RAZONA: Elige un ambiente (Ej: "Cafetería en Tokio bajo la lluvia", "Biblioteca antigua", "Cabaña en la nieve").
2. REDACTA: Crea un Título atractivo (con emojis) y una Descripción larga optimizada para SEO (mínimo 3 párrafos).
3. VISUALIZA: Escribe un PROMPT detallado en INGLÉS para generar la imagen de ese escenario (incluir: lo-fi style, aesthetic, detailed, 8k).

Responde ÚNICAMENTE con un objeto JSON que cumpla este esquema:
{schema}"#
    )
}

/// Official links block appended to every description.
pub fn marketing_footer(links: &MarketingLinks) -> String {
    format!(
        "\n\n👇 **LINKS OFICIALES** 👇\n\
         🎵 **Spotify:** {}\n\
         🌐 **Web / Radio:** {}\n\n\
         📻 *Transmitiendo desde Relax Station - Tu refugio de paz.* #lofi #chill #study #relax",
        links.spotify_url, links.website_url
    )
}

/// Strip a markdown code fence wrapped around a JSON payload.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_schema_fields() {
        let prompt = system_prompt();
        for field in ["concept_reasoning", "title", "description", "image_prompt"] {
            assert!(prompt.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_footer_contains_links() {
        let links = MarketingLinks {
            spotify_url: "https://open.spotify.com/x".into(),
            website_url: "https://example.com".into(),
        };
        let footer = marketing_footer(&links);
        assert!(footer.starts_with("\n\n👇 **LINKS OFICIALES** 👇"));
        assert!(footer.contains("🎵 **Spotify:** https://open.spotify.com/x"));
        assert!(footer.ends_with("#lofi #chill #study #relax"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"b\":2} "), "{\"b\":2}");
    }
}
