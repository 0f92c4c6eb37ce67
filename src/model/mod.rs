//! Core data structures shared by every converter and driver.
//!
//! - [`types`] – Vector/matrix aliases, small linear algebra helpers, bond orders.
//! - [`extension`] – Named side-channel fields for format-specific data.
//! - [`system`] – Multi-frame structure record with species, cells and coordinates.
//! - [`labeled`] – Structure record plus energies, forces and virials.
//! - [`bond_order`] – Structure record plus bond graph and formal charges.
//! - [`record`] – Trait unifying the three record kinds for post-processing.
//!
//! Plain geometry ([`System`]) stays separate from computed labels
//! ([`LabeledSystem`]) so a driver can turn one into the other without
//! touching the species layout.
//!
//! [`System`]: system::System
//! [`LabeledSystem`]: labeled::LabeledSystem

pub mod bond_order;
pub mod extension;
pub mod labeled;
pub mod record;
pub mod system;
pub mod types;
