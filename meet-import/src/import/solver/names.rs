//! Name normalization: last/first tokenization and coded names

use crate::import::keys::normalize;

/// Surname particles that glue onto the following token
/// ("DELLA ROVERE MARIO" -> last name "DELLA ROVERE").
const SURNAME_PARTICLES: &[&str] = &[
    "DE", "DEL", "DELLA", "DELLE", "DEI", "DEGLI", "DI", "DA", "LA", "LO", "LE", "VAN", "DER",
    "VON", "MC", "MAC", "SAN", "SANTA",
];

/// Split a normalized complete name into `(last_name, first_name)`.
///
/// The source prints surname first. By default the first token is the
/// surname and the rest the given name; leading particle tokens extend
/// the surname instead.
pub fn tokenize_name(complete_name: &str) -> (String, String) {
    let normalized = normalize(complete_name);
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        return (String::new(), String::new());
    }
    if tokens.len() == 1 {
        return (tokens[0].to_string(), String::new());
    }

    let mut split_at = 1;
    while split_at < tokens.len() - 1 && SURNAME_PARTICLES.contains(&tokens[split_at - 1]) {
        split_at += 1;
    }
    (tokens[..split_at].join(" "), tokens[split_at..].join(" "))
}

/// Squeeze a description into a deterministic alphanumeric code,
/// capped at `max_len` characters. Used for meetings/venues the source
/// supplies no code for.
pub fn coded_name(text: &str, max_len: usize) -> String {
    normalize(text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(max_len)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_surname_first() {
        assert_eq!(
            tokenize_name("ROSSI MARIO"),
            ("ROSSI".to_string(), "MARIO".to_string())
        );
    }

    #[test]
    fn test_double_surname_particle() {
        assert_eq!(
            tokenize_name("DELLA ROVERE MARIO"),
            ("DELLA ROVERE".to_string(), "MARIO".to_string())
        );
        assert_eq!(
            tokenize_name("VAN DER BERG ANNA"),
            ("VAN DER BERG".to_string(), "ANNA".to_string())
        );
    }

    #[test]
    fn test_single_token_is_all_surname() {
        assert_eq!(tokenize_name("ROSSI"), ("ROSSI".to_string(), String::new()));
    }

    #[test]
    fn test_coded_name_squeezes_and_caps() {
        assert_eq!(coded_name("Campionato Regionale 2019", 12), "campionatore");
        assert_eq!(coded_name("A.S.D. Nuoto X", 30), "asdnuotox");
    }
}
