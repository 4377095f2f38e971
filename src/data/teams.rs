//! NBA team reference and join-key helpers.
//!
//! Static mapping between full franchise names (as the odds provider
//! spells them) and the 3-letter codes used by the stats provider.

/// Full name → 3-letter code for all 30 franchises.
const TEAMS: &[(&str, &str)] = &[
    ("Atlanta Hawks", "ATL"),
    ("Boston Celtics", "BOS"),
    ("Brooklyn Nets", "BKN"),
    ("Charlotte Hornets", "CHA"),
    ("Chicago Bulls", "CHI"),
    ("Cleveland Cavaliers", "CLE"),
    ("Dallas Mavericks", "DAL"),
    ("Denver Nuggets", "DEN"),
    ("Detroit Pistons", "DET"),
    ("Golden State Warriors", "GSW"),
    ("Houston Rockets", "HOU"),
    ("Indiana Pacers", "IND"),
    ("Los Angeles Clippers", "LAC"),
    ("Los Angeles Lakers", "LAL"),
    ("Memphis Grizzlies", "MEM"),
    ("Miami Heat", "MIA"),
    ("Milwaukee Bucks", "MIL"),
    ("Minnesota Timberwolves", "MIN"),
    ("New Orleans Pelicans", "NOP"),
    ("New York Knicks", "NYK"),
    ("Oklahoma City Thunder", "OKC"),
    ("Orlando Magic", "ORL"),
    ("Philadelphia 76ers", "PHI"),
    ("Phoenix Suns", "PHX"),
    ("Portland Trail Blazers", "POR"),
    ("Sacramento Kings", "SAC"),
    ("San Antonio Spurs", "SAS"),
    ("Toronto Raptors", "TOR"),
    ("Utah Jazz", "UTA"),
    ("Washington Wizards", "WAS"),
];

/// Separator between away and home team in a matchup string.
pub const MATCHUP_SEPARATOR: &str = " @ ";

/// 3-letter code for a full team name.
pub fn code_for(full_name: &str) -> Option<&'static str> {
    let name = full_name.trim();
    TEAMS.iter().find(|(full, _)| *full == name).map(|(_, code)| *code)
}

/// Full team name for a 3-letter code.
pub fn full_name_for(code: &str) -> Option<&'static str> {
    let code = code.trim();
    TEAMS.iter().find(|(_, c)| *c == code).map(|(full, _)| *full)
}

/// Normalized player join key: trimmed and lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Build the matchup string the odds provider uses: `"{away} @ {home}"`.
pub fn matchup(away: &str, home: &str) -> String {
    format!("{away}{MATCHUP_SEPARATOR}{home}")
}

/// Resolve the opposing team's code from a `"Away @ Home"` matchup.
///
/// Returns `None` when the string is malformed, either side is not a known
/// franchise, or `team_code` plays on neither side.
pub fn resolve_opponent(matchup: &str, team_code: &str) -> Option<&'static str> {
    let (away, home) = matchup.split_once(MATCHUP_SEPARATOR)?;
    if home.contains(MATCHUP_SEPARATOR) {
        return None;
    }
    let away = code_for(away)?;
    let home = code_for(home)?;
    let team_code = team_code.trim();

    if team_code == away {
        Some(home)
    } else if team_code == home {
        Some(away)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_thirty_teams_round_trip() {
        assert_eq!(TEAMS.len(), 30);
        for (full, code) in TEAMS {
            assert_eq!(code_for(full), Some(*code));
            assert_eq!(full_name_for(code), Some(*full));
        }
    }

    #[test]
    fn test_unknown_team() {
        assert_eq!(code_for("Seattle SuperSonics"), None);
        assert_eq!(full_name_for("SEA"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  LeBron James "), "lebron james");
        assert_eq!(normalize_name("Nikola Jokić"), "nikola jokić");
    }

    #[test]
    fn test_resolve_opponent_home_player() {
        assert_eq!(resolve_opponent("Boston Celtics @ Los Angeles Lakers", "LAL"), Some("BOS"));
    }

    #[test]
    fn test_resolve_opponent_away_player() {
        assert_eq!(resolve_opponent("Boston Celtics @ Los Angeles Lakers", "BOS"), Some("LAL"));
    }

    #[test]
    fn test_resolve_opponent_unrelated_team() {
        assert_eq!(resolve_opponent("Boston Celtics @ Los Angeles Lakers", "MIA"), None);
    }

    #[test]
    fn test_resolve_opponent_malformed() {
        assert_eq!(resolve_opponent("Boston Celtics vs Los Angeles Lakers", "LAL"), None);
        assert_eq!(resolve_opponent("", "LAL"), None);
        assert_eq!(resolve_opponent("Boston Celtics @ Gotham Knights", "BOS"), None);
        assert_eq!(resolve_opponent("A @ B @ C", "BOS"), None);
    }

    #[test]
    fn test_matchup_format() {
        let m = matchup("Boston Celtics", "Los Angeles Lakers");
        assert_eq!(m, "Boston Celtics @ Los Angeles Lakers");
        assert_eq!(resolve_opponent(&m, "BOS"), Some("LAL"));
    }
}
