//! Deterministic color derivation from ranked song titles
//!
//! Each title is digested (MD5), offset by a digest of its rank position,
//! then folded into a single scalar with a triangular weighting that favors
//! later ranks. The scalar drives three sinusoids 120° apart, one per RGB
//! channel.
//!
//! The exact arithmetic is fixed: changing any step changes every color ever
//! produced, including those already cached.

use std::f64::consts::TAU;
use thiserror::Error;

/// Color assigned when no song data is available for a country
pub const FALLBACK_COLOR: &str = "#6B8620";

/// Exponent applied to the aggregate before channel mapping
const CONTRAST_EXPONENT: f64 = 2.0;

/// Hasher input errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashInputError {
    #[error("Cannot derive a color from an empty title list")]
    EmptyInput,
}

/// Map an ordered list of titles to a `#RRGGBB` color
///
/// Deterministic and order sensitive. Returns [`HashInputError::EmptyInput`]
/// for an empty list; callers substitute [`FALLBACK_COLOR`] instead.
pub fn color_for<S: AsRef<str>>(titles: &[S]) -> Result<String, HashInputError> {
    if titles.is_empty() {
        return Err(HashInputError::EmptyInput);
    }

    let n = titles.len() as f64;
    let weighted_sum: f64 = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let value = (normalized_digest(title.as_ref()) + normalized_digest(&i.to_string())) % 1.0;
            value * (i as f64 + 1.0)
        })
        .sum();

    let aggregate = weighted_sum / (n * (n + 1.0) / 2.0);
    let adjusted = aggregate.powf(CONTRAST_EXPONENT);

    let r = channel(adjusted);
    let g = channel(adjusted + 1.0 / 3.0);
    let b = channel(adjusted + 2.0 / 3.0);

    Ok(format!("#{:02X}{:02X}{:02X}", r, g, b))
}

/// Check the `#RRGGBB` shape (either hex case)
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// First 32 bits of the MD5 digest scaled into [0, 1]
fn normalized_digest(input: &str) -> f64 {
    let digest = md5::compute(input.as_bytes());
    let bytes = digest.0;
    let prefix = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    prefix as f64 / u32::MAX as f64
}

fn channel(phase: f64) -> u8 {
    (((phase * TAU).sin() + 1.0) * 127.5).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_colors() {
        assert_eq!(color_for(&["Song A", "Song B"]).unwrap(), "#4A35FE");
        assert_eq!(color_for(&["Song A"]).unwrap(), "#BBC200");
        assert_eq!(
            color_for(&["Blinding Lights", "Save Your Tears"]).unwrap(),
            "#09E490"
        );
    }

    #[test]
    fn test_deterministic() {
        let titles = vec![
            "Espresso".to_string(),
            "Birds of a Feather".to_string(),
            "Too Sweet".to_string(),
        ];
        assert_eq!(color_for(&titles).unwrap(), color_for(&titles).unwrap());
    }

    #[test]
    fn test_order_sensitive() {
        let forward = color_for(&["Song A", "Song B"]).unwrap();
        let reversed = color_for(&["Song B", "Song A"]).unwrap();
        assert_ne!(forward, reversed);
        assert_eq!(reversed, "#96E007");
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(color_for(&empty), Err(HashInputError::EmptyInput));
    }

    #[test]
    fn test_output_format() {
        let many: Vec<String> = (0..50).map(|i| format!("Track {}", i)).collect();
        for len in 1..=many.len() {
            let color = color_for(&many[..len]).unwrap();
            assert!(is_hex_color(&color), "bad color {}", color);
            assert_eq!(color, color.to_uppercase());
        }
    }

    #[test]
    fn test_unicode_titles() {
        let color = color_for(&["Déjà Vu", "夜に駆ける", "🎵"]).unwrap();
        assert!(is_hex_color(&color));
    }

    #[test]
    fn test_digest_range() {
        for s in ["", "0", "1", "some title", "ÄÖÜ"] {
            let v = normalized_digest(s);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_fallback_is_valid_color() {
        assert!(is_hex_color(FALLBACK_COLOR));
        assert!(!is_hex_color("6B8620"));
        assert!(!is_hex_color("#6B862"));
        assert!(!is_hex_color("#GGGGGG"));
    }
}
