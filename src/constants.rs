/// Source names, used as the `source` column of persisted rows and as the
/// keys of the per-source configuration sections.
pub const OPERA_HU_SOURCE: &str = "opera.hu";
pub const WIENER_STAATSOPER_SOURCE: &str = "wiener-staatsoper";
pub const ZAZ_TOUR_SOURCE: &str = "zaztour.com";
pub const COEUR_DE_PIRATE_SOURCE: &str = "coeurdepiratetour.com";

// Site roots
pub const OPERA_HU_BASE_URL: &str = "https://www.opera.hu";
pub const WIENER_STAATSOPER_BASE_URL: &str = "https://www.wiener-staatsoper.at";
pub const ZAZ_TOUR_URL: &str = "https://zaztour.com/en";
pub const COEUR_DE_PIRATE_TOUR_URL: &str = "https://coeurdepiratetour.com/en";

// Fallback venue labels
pub const OPERA_HU_DEFAULT_VENUE: &str = "Hungarian State Opera";
pub const WIENER_STAATSOPER_VENUE: &str = "Wiener Staatsoper";
pub const UNKNOWN_VENUE: &str = "Unknown";

/// Tag text that marks a performance as a rehearsal on opera.hu. It is a flag
/// on the show, so it never ends up in a production's tag list.
pub const REHEARSAL_TAG: &str = "rehearsal";

// Detail field limits, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const SYNOPSIS_MAX_CHARS: usize = 5000;
pub const GUIDE_MAX_CHARS: usize = 10000;

pub const DEFAULT_DELAY_MS: u64 = 500;
pub const DEFAULT_MONTHS_AHEAD: u32 = 12;

/// Get all supported source names, in the order `run_all` visits them
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        OPERA_HU_SOURCE,
        WIENER_STAATSOPER_SOURCE,
        ZAZ_TOUR_SOURCE,
        COEUR_DE_PIRATE_SOURCE,
    ]
}

/// Convert a user-friendly CLI name to the canonical source name
pub fn source_alias_to_name(alias: &str) -> String {
    match alias.trim().to_lowercase().as_str() {
        "opera_hu" | "operahu" | "opera-hu" => OPERA_HU_SOURCE.to_string(),
        "wiener_staatsoper" | "staatsoper" => WIENER_STAATSOPER_SOURCE.to_string(),
        "zaz" | "zaz_tour" | "zaztour" => ZAZ_TOUR_SOURCE.to_string(),
        "coeur_de_pirate" | "coeurdepirate" | "coeur-de-pirate" => {
            COEUR_DE_PIRATE_SOURCE.to_string()
        }
        other => other.to_string(),
    }
}
