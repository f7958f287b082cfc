pub mod chrome;
pub mod driver;
pub mod session;
pub mod static_site;

pub use chrome::{ChromeDriver, ChromeLauncher};
pub use driver::{Driver, Locator, NodeHandle};
pub use session::{Session, SessionFactory};
pub use static_site::{StaticDriver, StaticSite};
