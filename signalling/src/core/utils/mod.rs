pub mod bcrypt_utils;
pub mod crypto_utils;
pub mod jwt_utils;
pub mod keyed_lock;
pub mod sanitize_utils;

#[macro_use]
pub mod try_from_i16;
