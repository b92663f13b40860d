// Club name normalization. Park factor tables list clubs by nickname while
// batting tables use FanGraphs abbreviations.

const CLUB_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Angels", "LAA"),
    ("Astros", "HOU"),
    ("Athletics", "OAK"),
    ("Blue Jays", "TOR"),
    ("Braves", "ATL"),
    ("Brewers", "MIL"),
    ("Cardinals", "STL"),
    ("Cubs", "CHC"),
    ("Diamondbacks", "ARI"),
    ("Dodgers", "LAD"),
    ("Giants", "SFG"),
    ("Guardians", "CLE"),
    ("Mariners", "SEA"),
    ("Marlins", "MIA"),
    ("Mets", "NYM"),
    ("Nationals", "WSN"),
    ("Orioles", "BAL"),
    ("Padres", "SDP"),
    ("Phillies", "PHI"),
    ("Pirates", "PIT"),
    ("Rangers", "TEX"),
    ("Rays", "TBR"),
    ("Red Sox", "BOS"),
    ("Reds", "CIN"),
    ("Rockies", "COL"),
    ("Royals", "KCR"),
    ("Tigers", "DET"),
    ("Twins", "MIN"),
    ("White Sox", "CHW"),
    ("Yankees", "NYY"),
];

/// Map a club nickname to its abbreviation. Anything that is not a known
/// nickname (including values that already are abbreviations) is returned
/// trimmed and upper-cased.
pub fn normalize_team(raw: &str) -> String {
    let trimmed = raw.trim();
    CLUB_ABBREVIATIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, abbr)| abbr.to_string())
        .unwrap_or_else(|| trimmed.to_uppercase())
}
