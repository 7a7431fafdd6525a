pub mod event;
pub mod moisture;
pub mod parcel;
pub mod recommendation;
pub mod sensor;
pub mod time_window;
pub mod weather;

pub use event::{IrrigationEvent, IrrigationTrigger};
pub use moisture::{MoistureCategory, MoistureRange};
pub use parcel::{ParcelConfig, ParcelStatus, SoilType, TreeProfile};
pub use recommendation::{Recommendation, RecommendationLevel};
pub use sensor::{SensorReading, SensorStatus};
pub use time_window::TimeWindow;
pub use weather::WeatherSnapshot;
