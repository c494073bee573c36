//! Dashboard assembly for the tickbars system.
//!
//! This crate handles:
//! - Loading every dataset once into an immutable [`DashboardData`]
//! - The commentary lookup table
//! - Turning a page selection into a renderer-agnostic [`ChartView`]

pub mod commentary;
pub mod data;
pub mod render;
pub mod view;

pub use commentary::{CommentBlock, Commentary, Note};
pub use data::DashboardData;
pub use render::{render, Dashboard};
pub use view::{BarView, ChartView, CryptoBarsRequest, Panel, Point, Series, ViewRequest};
