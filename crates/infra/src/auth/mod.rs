//! Credential-handling adapters: token file, token endpoint, signers

mod device_lock;
mod oauth_endpoint;
pub mod piv;
mod software_signer;
mod token_file;

pub use device_lock::DeviceLock;
pub use oauth_endpoint::HttpTokenEndpoint;
pub use piv::{DeviceConnector, PivDevice, PivSigner, ProvisionReport};
pub use software_signer::SoftwareSigner;
pub use token_file::FileTokenStore;
