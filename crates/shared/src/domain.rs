use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! index_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Positional identity in the ordered group collection, as returned by the backend.
index_newtype!(GroupId);

/// Asset stem used when a character has no breed assigned.
pub const UNASSIGNED_ICON_KEY: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Breed {
    Ecaflip,
    Eniripsa,
    Iop,
    Cra,
    Feca,
    Sacrieur,
    Sadida,
    Osamodas,
    Enutrof,
    Sram,
    #[serde(alias = "Xélor")]
    Xelor,
    Pandawa,
    Roublard,
    Zobal,
    Steamer,
    Eliotrope,
    Huppermage,
    Ouginak,
    Forgelance,
}

impl Breed {
    pub const ALL: [Breed; 19] = [
        Breed::Ecaflip,
        Breed::Eniripsa,
        Breed::Iop,
        Breed::Cra,
        Breed::Feca,
        Breed::Sacrieur,
        Breed::Sadida,
        Breed::Osamodas,
        Breed::Enutrof,
        Breed::Sram,
        Breed::Xelor,
        Breed::Pandawa,
        Breed::Roublard,
        Breed::Zobal,
        Breed::Steamer,
        Breed::Eliotrope,
        Breed::Huppermage,
        Breed::Ouginak,
        Breed::Forgelance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Breed::Ecaflip => "Ecaflip",
            Breed::Eniripsa => "Eniripsa",
            Breed::Iop => "Iop",
            Breed::Cra => "Cra",
            Breed::Feca => "Feca",
            Breed::Sacrieur => "Sacrieur",
            Breed::Sadida => "Sadida",
            Breed::Osamodas => "Osamodas",
            Breed::Enutrof => "Enutrof",
            Breed::Sram => "Sram",
            Breed::Xelor => "Xelor",
            Breed::Pandawa => "Pandawa",
            Breed::Roublard => "Roublard",
            Breed::Zobal => "Zobal",
            Breed::Steamer => "Steamer",
            Breed::Eliotrope => "Eliotrope",
            Breed::Huppermage => "Huppermage",
            Breed::Ouginak => "Ouginak",
            Breed::Forgelance => "Forgelance",
        }
    }

    /// Asset stem for the breed icon (`breeds/<key>.png` in the presentation layer).
    pub fn icon_key(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Breed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown breed '{0}'")]
pub struct UnknownBreed(pub String);

impl FromStr for Breed {
    type Err = UnknownBreed;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('é', "e").replace('É', "E");
        Breed::ALL
            .into_iter()
            .find(|breed| breed.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownBreed(raw.to_string()))
    }
}

/// A pool character, or a membership record when embedded in [`Group::characters`].
///
/// `enabled` belongs to the membership: the same name can be enabled in one
/// group and disabled in another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub breed: Option<Breed>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            breed: None,
            enabled: true,
        }
    }

    pub fn with_breed(mut self, breed: Breed) -> Self {
        self.breed = Some(breed);
        self
    }

    pub fn icon_key(&self) -> &'static str {
        self.breed
            .as_ref()
            .map(Breed::icon_key)
            .unwrap_or(UNASSIGNED_ICON_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            characters: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.characters.iter().any(|member| member.name == name)
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.characters
            .iter()
            .map(|member| member.name.as_str())
            .collect()
    }
}

/// Observer-side view: which group is mirrored and its ordered membership.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveSnapshot {
    pub focus: GroupId,
    pub characters: Vec<Character>,
}

impl ActiveSnapshot {
    pub fn new(focus: GroupId, characters: Vec<Character>) -> Self {
        Self { focus, characters }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// Which side of the anchor member a dropped character lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Before,
    After,
}

impl Side {
    /// `After` when the pointer is strictly past the horizontal midpoint of the anchor bounds.
    pub fn from_pointer(pointer_x: f64, bounds_x: f64, bounds_width: f64) -> Self {
        let middle_x = bounds_x + bounds_width / 2.0;
        if pointer_x > middle_x {
            Side::After
        } else {
            Side::Before
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Before => "before",
            Side::After => "after",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "before" | "left" => Ok(Side::Before),
            "after" | "right" => Ok(Side::After),
            other => Err(format!("unknown side '{other}', expected before or after")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breed_parses_case_insensitively_and_accepts_accented_xelor() {
        assert_eq!("cra".parse::<Breed>(), Ok(Breed::Cra));
        assert_eq!("Xélor".parse::<Breed>(), Ok(Breed::Xelor));
        assert!("Paladin".parse::<Breed>().is_err());
    }

    #[test]
    fn unassigned_breed_uses_sentinel_icon() {
        let character = Character::new("Iop1");
        assert_eq!(character.icon_key(), UNASSIGNED_ICON_KEY);
        assert_eq!(character.with_breed(Breed::Iop).icon_key(), "Iop");
    }

    #[test]
    fn pointer_past_midpoint_drops_after_anchor() {
        assert_eq!(Side::from_pointer(151.0, 100.0, 100.0), Side::After);
        assert_eq!(Side::from_pointer(150.0, 100.0, 100.0), Side::Before);
        assert_eq!(Side::from_pointer(101.0, 100.0, 100.0), Side::Before);
    }

    #[test]
    fn character_defaults_to_enabled_when_flag_missing() {
        let character: Character =
            serde_json::from_str(r#"{"name":"Iop1","breed":"Cra"}"#).expect("character");
        assert!(character.enabled);
        assert_eq!(character.breed, Some(Breed::Cra));
    }
}
