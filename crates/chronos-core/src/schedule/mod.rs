//! Calendar expression parsing and next-fire computation

pub mod calendar;

pub use calendar::CalendarEngine;
