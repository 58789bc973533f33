pub mod filter;
pub mod interp;
pub mod ode;
