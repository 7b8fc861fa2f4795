use std::{
	fmt::Debug,
	sync::atomic::{AtomicBool, Ordering},
};

/// Connectivity as reported by the host application. Consulted before every download.
pub trait NetworkAvailability: Debug + Send + Sync {
	fn is_network_available(&self) -> bool;

	fn is_wifi_available(&self) -> bool {
		self.is_network_available()
	}

	fn is_cellular_available(&self) -> bool {
		false
	}
}

/// Assumes the network is always reachable over WiFi.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl NetworkAvailability for AlwaysOnline {
	fn is_network_available(&self) -> bool {
		true
	}
}

/// Connectivity flags the host application flips when the link changes.
#[derive(Debug)]
pub struct SwitchableAvailability {
	online: AtomicBool,
	wifi: AtomicBool,
}

impl SwitchableAvailability {
	/// Starts with WiFi as the link type, whether online or not.
	pub fn new(online: bool) -> Self {
		SwitchableAvailability {
			online: AtomicBool::new(online),
			wifi: AtomicBool::new(true),
		}
	}

	pub fn set_online(&self, online: bool) {
		log::debug!("network is now {}", if online { "online" } else { "offline" });
		self.online.store(online, Ordering::Release);
	}

	/// Whether the link, when online, goes through WiFi rather than a cellular network.
	pub fn set_wifi(&self, wifi: bool) {
		self.wifi.store(wifi, Ordering::Release);
	}
}

impl NetworkAvailability for SwitchableAvailability {
	fn is_network_available(&self) -> bool {
		self.online.load(Ordering::Acquire)
	}

	fn is_wifi_available(&self) -> bool {
		self.is_network_available() && self.wifi.load(Ordering::Acquire)
	}

	fn is_cellular_available(&self) -> bool {
		self.is_network_available() && !self.wifi.load(Ordering::Acquire)
	}
}
