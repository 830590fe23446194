// Wire codecs: each one turns a vendor response body into a `FieldBag`.

pub mod json;
pub mod kv;
pub mod soap;
pub mod xml;
