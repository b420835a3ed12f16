pub mod omdena;
pub mod posadas;
