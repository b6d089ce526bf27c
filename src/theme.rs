use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

use crate::error::FormError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[field(value = "star_wars")]
    StarWars,
    #[field(value = "harry_potter")]
    HarryPotter,
    #[field(value = "both")]
    Both,
    #[field(value = "none")]
    None,
}

impl Theme {
    pub fn wants_house(self) -> bool {
        matches!(self, Theme::HarryPotter | Theme::Both)
    }

    pub fn wants_side(self) -> bool {
        matches!(self, Theme::StarWars | Theme::Both)
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::StarWars => "Star Wars",
            Theme::HarryPotter => "Harry Potter",
            Theme::Both => "Both",
            Theme::None => "None",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum House {
    #[field(value = "gryffindor")]
    Gryffindor,
    #[field(value = "slytherin")]
    Slytherin,
    #[field(value = "hufflepuff")]
    Hufflepuff,
    #[field(value = "ravenclaw")]
    Ravenclaw,
}

impl House {
    pub fn label(self) -> &'static str {
        match self {
            House::Gryffindor => "Gryffindor",
            House::Slytherin => "Slytherin",
            House::Hufflepuff => "Hufflepuff",
            House::Ravenclaw => "Ravenclaw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[field(value = "jedi")]
    Jedi,
    #[field(value = "sith")]
    Sith,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Jedi => "Jedi",
            Side::Sith => "Sith",
        }
    }
}

/// A guest's complete theme selection. House and side are present exactly
/// when the theme calls for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeChoice {
    pub theme: Theme,
    pub house: Option<House>,
    pub side: Option<Side>,
}

impl ThemeChoice {
    /// Checks one guest's selection, `guest` being the zero-based slot used
    /// in error messages. Sub-choices the theme does not call for are dropped.
    pub fn resolve(
        guest: usize,
        theme: Option<Theme>,
        house: Option<House>,
        side: Option<Side>,
    ) -> Result<Self, FormError> {
        let theme = theme.ok_or(FormError::MissingTheme { guest: guest + 1 })?;

        let house = if theme.wants_house() {
            Some(house.ok_or(FormError::MissingHouse { guest: guest + 1 })?)
        } else {
            None
        };
        let side = if theme.wants_side() {
            Some(side.ok_or(FormError::MissingSide { guest: guest + 1 })?)
        } else {
            None
        };

        Ok(ThemeChoice { theme, house, side })
    }
}

/// JSON document stored in `preferences.preferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceDoc {
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<House>,
    #[serde(rename = "jediSith", default, skip_serializing_if = "Option::is_none")]
    pub jedi_sith: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
}

impl PreferenceDoc {
    pub fn new(choice: ThemeChoice, age: Option<u8>) -> Self {
        PreferenceDoc {
            theme: choice.theme,
            house: choice.house,
            jedi_sith: choice.side,
            age,
        }
    }
}

/// Per-theme counts shown on the operator overview.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeTally {
    pub star_wars: usize,
    pub harry_potter: usize,
    pub both: usize,
    pub none: usize,
    pub gryffindor: usize,
    pub slytherin: usize,
    pub hufflepuff: usize,
    pub ravenclaw: usize,
    pub jedi: usize,
    pub sith: usize,
}

impl ThemeTally {
    pub fn from_docs<'a>(docs: impl IntoIterator<Item = &'a PreferenceDoc>) -> Self {
        let mut tally = ThemeTally::default();
        for doc in docs {
            match doc.theme {
                Theme::StarWars => tally.star_wars += 1,
                Theme::HarryPotter => tally.harry_potter += 1,
                Theme::Both => tally.both += 1,
                Theme::None => tally.none += 1,
            }
            match doc.house {
                Some(House::Gryffindor) => tally.gryffindor += 1,
                Some(House::Slytherin) => tally.slytherin += 1,
                Some(House::Hufflepuff) => tally.hufflepuff += 1,
                Some(House::Ravenclaw) => tally.ravenclaw += 1,
                None => {}
            }
            match doc.jedi_sith {
                Some(Side::Jedi) => tally.jedi += 1,
                Some(Side::Sith) => tally.sith += 1,
                None => {}
            }
        }
        tally
    }
}
