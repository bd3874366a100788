mod contact;
mod envelope;
mod phone;

pub use contact::{CardNumber, Contact, ContactCard};
pub use envelope::{CacheEnvelope, CachedContacts};
pub use phone::{split_numbers, PhoneEntry, PhoneType};
