mod url;

pub use url::{CreateUrlRequest, NewMapping, UrlMapping};
