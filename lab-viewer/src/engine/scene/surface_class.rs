use constants::surface::GLASS_PATTERNS;

/// Render treatment for a lab surface, decided once at compose time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    /// Double sided and translucent.
    Glass,
    /// Back-face culled.
    Opaque,
}

impl SurfaceClass {
    pub fn double_sided(self) -> bool {
        matches!(self, SurfaceClass::Glass)
    }
}

/// Split a name into lowercase words on separators, digits and camelCase humps.
/// `Ceiling_Panel02` gives `ceiling`, `panel`, `02`; `GLASSPane` gives `glass`, `pane`.
fn name_tokens(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(&prev) = i.checked_sub(1).and_then(|j| chars.get(j)) {
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = (prev.is_ascii_lowercase() && c.is_ascii_uppercase())
                || (prev.is_ascii_uppercase() && c.is_ascii_uppercase() && next_lower)
                || (prev.is_ascii_digit() != c.is_ascii_digit() && prev.is_ascii_alphanumeric());
            if boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// Whole words only, so "panel" never reads as "pane". Plurals count.
fn is_glass_token(token: &str) -> bool {
    GLASS_PATTERNS.iter().any(|&pattern| {
        token == pattern
            || token.strip_suffix('s') == Some(pattern)
            || token.strip_suffix("es") == Some(pattern)
    })
}

/// Classify a surface from its material, mesh and node names.
pub fn classify<'a>(names: impl IntoIterator<Item = &'a str>) -> SurfaceClass {
    let glass = names
        .into_iter()
        .any(|name| name_tokens(name).iter().any(|t| is_glass_token(t)));
    if glass {
        SurfaceClass::Glass
    } else {
        SurfaceClass::Opaque
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_any_name_case_insensitively() {
        assert_eq!(classify(["Window_Frame_01"]), SurfaceClass::Glass);
        assert_eq!(classify(["Wall", "GLASS_clear"]), SurfaceClass::Glass);
        assert_eq!(classify(["transparentPanel"]), SurfaceClass::Glass);
        assert_eq!(classify(["Wall", "Plaster"]), SurfaceClass::Opaque);
        assert_eq!(classify(std::iter::empty()), SurfaceClass::Opaque);
    }

    #[test]
    fn panels_are_not_panes() {
        for name in ["Ceiling_Panel", "SolarPanel_Roof", "Wall_Panels", "Paneling_Oak"] {
            assert_eq!(classify([name]), SurfaceClass::Opaque, "{name}");
        }
        assert_eq!(classify(["Door_Pane"]), SurfaceClass::Glass);
        assert_eq!(classify(["WindowPanes"]), SurfaceClass::Glass);
        assert_eq!(classify(["GLASSPane2"]), SurfaceClass::Glass);
        assert_eq!(classify(["Fiberglass_Hood"]), SurfaceClass::Opaque);
    }

    #[test]
    fn tokens_split_on_case_digits_and_separators() {
        assert_eq!(name_tokens("Ceiling_Panel02"), ["ceiling", "panel", "02"]);
        assert_eq!(name_tokens("GLASSPane"), ["glass", "pane"]);
        assert_eq!(name_tokens("wall.north-3"), ["wall", "north", "3"]);
    }
}
