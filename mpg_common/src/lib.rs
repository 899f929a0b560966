mod paisa;

pub mod helpers;
pub mod op;

pub use paisa::{Paisa, PaisaConversionError, BDT_CURRENCY_CODE, PAISA_PER_TAKA};
