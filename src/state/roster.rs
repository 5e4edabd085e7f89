use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of the two rotation groups owning an independent queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team {
    Eproc,
    Jpe,
}

impl Team {
    /// Both teams, in display order.
    pub const ALL: [Team; 2] = [Team::Eproc, Team::Jpe];

    /// Stable code used in routes, audit descriptions and persisted records.
    pub fn code(self) -> &'static str {
        match self {
            Team::Eproc => "EPROC",
            Team::Jpe => "JPE",
        }
    }

    /// Human-facing team name sent to the automation webhook.
    pub fn display_name(self) -> &'static str {
        match self {
            Team::Eproc => "Eproc",
            Team::Jpe => "Legados",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Raised when a path segment or config entry names no known team.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown team `{0}`")]
pub struct UnknownTeam(pub String);

impl FromStr for Team {
    type Err = UnknownTeam;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EPROC" => Ok(Team::Eproc),
            "JPE" | "LEGADOS" => Ok(Team::Jpe),
            _ => Err(UnknownTeam(value.to_string())),
        }
    }
}

/// Static membership list mapping every known person to their rotation team.
///
/// People without a team (managers, secretariat) are still known so they can
/// act and carry a status, but queue-affecting operations ignore them.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: IndexMap<String, Option<Team>>,
}

impl Roster {
    /// Build a roster from `(name, team)` pairs. Later duplicates win.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Team>)>,
        S: Into<String>,
    {
        let mut members: IndexMap<String, Option<Team>> = entries
            .into_iter()
            .map(|(name, team)| (name.into(), team))
            .collect();
        members.sort_keys();
        Self { members }
    }

    /// Team owning `person`'s queue, if they rotate at all.
    pub fn team_of(&self, person: &str) -> Option<Team> {
        self.members.get(person).copied().flatten()
    }

    /// Whether the person is listed, with or without a team.
    pub fn contains(&self, person: &str) -> bool {
        self.members.contains_key(person)
    }

    /// Iterate over every listed person and their team, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<Team>)> {
        self.members
            .iter()
            .map(|(name, team)| (name.as_str(), *team))
    }

    /// Number of listed people.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when nobody is listed.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Roster shipped with the binary, used when no configuration overrides it.
    pub fn builtin() -> Self {
        const WITHOUT_TEAM: &[&str] = &["Brenda", "Larissa", "Gilberto", "Matheus", "Juliana"];
        const EPROC: &[&str] = &[
            "Barbara Mara",
            "Bruno Glaicon",
            "Claudia Luiza",
            "Douglas Paiva",
            "Fábio Alves",
            "Glayce Torres",
            "Isabela Dias",
            "Isac Candido",
            "Ivana Guimarães",
            "Leonardo Damaceno",
            "Marcelo Pena Guerra",
            "Michael Douglas",
            "Morôni",
            "Pablo Mol",
            "Ranyer Segal",
            "Sarah Leal",
            "Victoria Lisboa",
        ];
        const JPE: &[&str] = &[
            "Alex Paulo",
            "Dirceu Gonçalves",
            "Douglas De Souza",
            "Farley",
            "Gleis",
            "Hugo Leonardo",
            "Igor Dayrell",
            "Jerry Marcos",
            "Jonatas",
            "Leandro",
            "Luiz Henrique",
            "Marcelo dos Santos Dutra",
            "Marina Amaral",
            "Marina Marques",
            "Vanessa Ligiane",
        ];

        let entries = WITHOUT_TEAM
            .iter()
            .map(|name| (*name, None))
            .chain(EPROC.iter().map(|name| (*name, Some(Team::Eproc))))
            .chain(JPE.iter().map(|name| (*name, Some(Team::Jpe))));
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_parsing_accepts_codes_and_display_names() {
        assert_eq!("eproc".parse::<Team>(), Ok(Team::Eproc));
        assert_eq!("JPE".parse::<Team>(), Ok(Team::Jpe));
        assert_eq!("Legados".parse::<Team>(), Ok(Team::Jpe));
        assert!("finance".parse::<Team>().is_err());
    }

    #[test]
    fn builtin_roster_maps_teams() {
        let roster = Roster::builtin();
        assert_eq!(roster.team_of("Farley"), Some(Team::Jpe));
        assert_eq!(roster.team_of("Morôni"), Some(Team::Eproc));
        assert_eq!(roster.team_of("Matheus"), None);
        assert!(roster.contains("Matheus"));
        assert_eq!(roster.team_of("Nobody"), None);
    }

    #[test]
    fn roster_iterates_sorted() {
        let roster = Roster::new([("Zeca", Some(Team::Jpe)), ("Ana", None)]);
        let names: Vec<_> = roster.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Ana", "Zeca"]);
    }
}
