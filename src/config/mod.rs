pub mod intents;
pub mod persona;

pub use intents::{ load_intents, Intent, Intents };
pub use persona::{ Persona, FALLBACK_REPLY };
