//! Canonical trip plan and the pure operations over it
//!
//! The plan is only ever changed through [`merge`]; [`route`] classifies what
//! kind of step is legal next.

mod merge;
mod model;
mod payload;
mod router;

#[cfg(test)]
mod proptests;

pub use merge::merge;
pub use model::{
    BudgetItem, CityStop, FlightOption, HotelOption, ItineraryDay, Meals, Plan, PlanStatus,
    DEFAULT_DAY_TITLE,
};
pub use payload::{UpdatePayload, ValidationError};
pub use router::{guard_update, route, ActionCategory, CityStep, FinalizeStep};
