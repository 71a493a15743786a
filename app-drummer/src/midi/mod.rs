pub mod drivers;
pub mod io;
