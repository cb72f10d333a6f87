//! Page parsers. Every function here is pure and total: malformed input
//! yields empty output or `None` fields, never a panic.

pub mod all_dates;
pub mod calendar;
pub mod detail;
pub mod json_ld;
pub mod programme;
pub mod text;
pub mod tour_dates;

pub use all_dates::parse_active_months;
pub use detail::{parse_detail, ProductionDetail, SynopsisFormat};
pub use json_ld::{extract_structured_events, structured_event_to_show};
pub use programme::{parse_programme, RawEvent};
