pub mod aladhan;
pub mod kaspi;
pub mod openweather;
pub mod telegram;
pub mod util;

pub use aladhan::AladhanProvider;
pub use kaspi::KaspiRateProvider;
pub use openweather::OpenWeatherProvider;
pub use telegram::TelegramNotifier;
