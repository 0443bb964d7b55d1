pub mod character;

pub use character::{CharacterRecord, RawCharacter};
