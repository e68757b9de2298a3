mod assert;
mod hostname;

pub use hostname::local_hostname;
