/*!
 * Operator commands driven by the `riskguard` binary
 */

pub mod drill;
pub mod simulate;
