//! Hardware PIV signer
//!
//! The private key lives on a PIV smart card and never leaves it. Each
//! signing call opens the device, verifies the PIN if one is configured,
//! and performs the raw RSA operation on the card, all under the
//! cross-process [`DeviceLock`]: batch workers are separate OS processes
//! and the card tolerates exactly one driver at a time.
//!
//! The digest and EMSA-PKCS1-v1_5 padding are computed host side; the card
//! only exponentiates. Device access goes through [`PivDevice`] /
//! [`DeviceConnector`] so everything above the PC/SC boundary is testable
//! without hardware.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use sha2::{Digest, Sha256};
use steward_core::auth::Signer;
use steward_domain::{Result, StewardError};
use tracing::{info, warn};

use super::device_lock::DeviceLock;

/// PIV factory defaults, replaced during provisioning.
const DEFAULT_PIN: &str = "123456";
const DEFAULT_PUK: &str = "12345678";

const PIN_ATTEMPTS: usize = 2;
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// RSA-2048 modulus size in bytes.
const RSA_2048_BLOCK: usize = 256;

/// DER DigestInfo prefix for SHA-256 (RFC 8017 §9.2 note 1).
const SHA256_DIGEST_INFO: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

/// One attached PIV device, opened for the duration of an operation.
pub trait PivDevice {
    fn serial(&self) -> u32;

    fn verify_pin(&mut self, pin: &str) -> Result<()>;

    /// Raw RSA signature over an already-padded block.
    fn sign_raw(&mut self, padded: &[u8]) -> Result<Vec<u8>>;

    /// Reset the PIV applet to factory state, wiping keys and PINs.
    fn reset(&mut self) -> Result<()>;

    fn change_pin(&mut self, old: &str, new: &str) -> Result<()>;

    fn change_puk(&mut self, old: &str, new: &str) -> Result<()>;

    /// Generate a signing key on the device and install a self-signed
    /// certificate for it. Returns the certificate DER.
    fn provision_key(&mut self, subject: &str) -> Result<Vec<u8>>;
}

/// Enumerates and opens PIV devices.
pub trait DeviceConnector: Send + Sync {
    fn list(&self) -> Result<Vec<u32>>;

    fn open(&self, serial: u32) -> Result<Box<dyn PivDevice>>;
}

/// Outcome of destructive provisioning: the operator must record the fresh
/// PIN and PUK, they exist nowhere else.
#[derive(Debug)]
pub struct ProvisionReport {
    pub serial: u32,
    pub pin: String,
    pub puk: String,
    pub certificate_fingerprint: String,
}

pub struct PivSigner {
    connector: Box<dyn DeviceConnector>,
    serial: Option<u32>,
    pin: Option<String>,
    lock_dir: PathBuf,
    key_id: String,
}

impl PivSigner {
    pub fn new(
        connector: Box<dyn DeviceConnector>,
        serial: Option<u32>,
        pin: Option<String>,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        let key_id = match serial {
            Some(serial) => format!("piv-{serial}"),
            None => "piv".to_string(),
        };
        Self { connector, serial, pin, lock_dir: lock_dir.into(), key_id }
    }

    /// Pick the device to use. Without a configured serial, exactly one
    /// attached device is required; ambiguity is fatal rather than guessed
    /// at.
    fn resolve_serial(&self) -> Result<u32> {
        if let Some(serial) = self.serial {
            return Ok(serial);
        }
        let devices = self.connector.list()?;
        match devices.as_slice() {
            [] => Err(StewardError::Signer("no PIV device attached".to_string())),
            [only] => Ok(*only),
            many => Err(StewardError::Signer(format!(
                "{} PIV devices attached; configure a serial to disambiguate",
                many.len()
            ))),
        }
    }

    fn verify_pin_bounded(&self, device: &mut dyn PivDevice) -> Result<()> {
        let Some(pin) = &self.pin else { return Ok(()) };
        let mut last = None;
        for attempt in 1..=PIN_ATTEMPTS {
            match device.verify_pin(pin) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "PIN verification failed");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| StewardError::Signer("PIN verification failed".to_string())))
    }

    /// Factory-reset the device and set it up for signing: fresh PIN and
    /// PUK, on-device key generation, self-signed certificate.
    ///
    /// Destroys every key and credential on the PIV applet. Callers must
    /// obtain explicit operator confirmation before invoking this.
    ///
    /// # Errors
    /// Returns `StewardError::Signer` on any device failure; the device may
    /// be left freshly reset but unprovisioned.
    pub fn provision(&self, subject: &str) -> Result<ProvisionReport> {
        let serial = self.resolve_serial()?;
        let _lock = DeviceLock::acquire(&self.lock_dir, serial, LOCK_TIMEOUT)?;
        let mut device = self.connector.open(serial)?;

        info!(serial, "resetting PIV applet");
        device.reset()?;

        let pin = random_digits(8);
        let puk = random_digits(8);
        device.change_pin(DEFAULT_PIN, &pin)?;
        device.change_puk(DEFAULT_PUK, &puk)?;
        device.verify_pin(&pin)?;

        let certificate = device.provision_key(subject)?;
        let certificate_fingerprint = hex::encode(Sha256::digest(&certificate));
        info!(serial, fingerprint = %certificate_fingerprint, "provisioned signing key");

        Ok(ProvisionReport { serial, pin, puk, certificate_fingerprint })
    }
}

impl Signer for PivSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let serial = self.resolve_serial()?;
        let padded = pkcs1v15_sha256(message);

        // Lock held strictly around the device session.
        let _lock = DeviceLock::acquire(&self.lock_dir, serial, LOCK_TIMEOUT)?;
        let mut device = self.connector.open(serial)?;
        self.verify_pin_bounded(device.as_mut())?;
        device.sign_raw(&padded)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// EMSA-PKCS1-v1_5 encoding of the SHA-256 digest for an RSA-2048 modulus.
fn pkcs1v15_sha256(message: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(message);
    let ps_len = RSA_2048_BLOCK - 3 - SHA256_DIGEST_INFO.len() - digest.len();

    let mut em = Vec::with_capacity(RSA_2048_BLOCK);
    em.push(0x00);
    em.push(0x01);
    em.resize(2 + ps_len, 0xff);
    em.push(0x00);
    em.extend_from_slice(&SHA256_DIGEST_INFO);
    em.extend_from_slice(&digest);
    em
}

fn random_digits(count: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

/// PC/SC backend over real hardware. Compiled only with the
/// `piv-hardware` feature; everything above this module works against the
/// traits and is exercised without a device.
#[cfg(feature = "piv-hardware")]
pub mod hardware {
    use yubikey::piv::{self, AlgorithmId, SlotId};
    use yubikey::{MgmKey, Serial, YubiKey};

    use super::{DeviceConnector, PivDevice};
    use steward_domain::{Result, StewardError};

    fn device_err(context: &str, e: impl std::fmt::Display) -> StewardError {
        StewardError::Signer(format!("{context}: {e}"))
    }

    pub struct PcscConnector;

    impl DeviceConnector for PcscConnector {
        fn list(&self) -> Result<Vec<u32>> {
            let mut context = yubikey::reader::Context::open()
                .map_err(|e| device_err("PC/SC context", e))?;
            let mut serials = Vec::new();
            for reader in context.iter().map_err(|e| device_err("reader enumeration", e))? {
                if let Ok(device) = reader.open() {
                    serials.push(u32::from(device.serial()));
                }
            }
            Ok(serials)
        }

        fn open(&self, serial: u32) -> Result<Box<dyn PivDevice>> {
            let inner = YubiKey::open_by_serial(Serial::from(serial))
                .map_err(|e| device_err("device open", e))?;
            Ok(Box::new(PcscDevice { inner }))
        }
    }

    struct PcscDevice {
        inner: YubiKey,
    }

    impl PivDevice for PcscDevice {
        fn serial(&self) -> u32 {
            u32::from(self.inner.serial())
        }

        fn verify_pin(&mut self, pin: &str) -> Result<()> {
            self.inner.verify_pin(pin.as_bytes()).map_err(|e| device_err("PIN verify", e))
        }

        fn sign_raw(&mut self, padded: &[u8]) -> Result<Vec<u8>> {
            let signature =
                piv::sign_data(&mut self.inner, padded, AlgorithmId::Rsa2048, SlotId::Signature)
                    .map_err(|e| device_err("on-device sign", e))?;
            Ok(signature.to_vec())
        }

        fn reset(&mut self) -> Result<()> {
            self.inner.reset_device().map_err(|e| device_err("applet reset", e))
        }

        fn change_pin(&mut self, old: &str, new: &str) -> Result<()> {
            self.inner
                .change_pin(old.as_bytes(), new.as_bytes())
                .map_err(|e| device_err("PIN change", e))
        }

        fn change_puk(&mut self, old: &str, new: &str) -> Result<()> {
            self.inner
                .change_puk(old.as_bytes(), new.as_bytes())
                .map_err(|e| device_err("PUK change", e))
        }

        fn provision_key(&mut self, subject: &str) -> Result<Vec<u8>> {
            use yubikey::certificate::yubikey_signer::{Rsa2048, YubiRsa};
            use yubikey::certificate::Certificate;
            use yubikey::piv::{PinPolicy, TouchPolicy};

            self.inner
                .authenticate(MgmKey::default())
                .map_err(|e| device_err("management key auth", e))?;

            let public = piv::generate(
                &mut self.inner,
                SlotId::Signature,
                AlgorithmId::Rsa2048,
                PinPolicy::Once,
                TouchPolicy::Never,
            )
            .map_err(|e| device_err("on-device keygen", e))?;

            Certificate::generate_self_signed::<_, YubiRsa<Rsa2048>>(
                &mut self.inner,
                SlotId::Signature,
                [0u8; 20],
                None,
                subject.parse().map_err(|e| device_err("certificate subject", e))?,
                public,
                |_| Ok(()),
            )
            .map_err(|e| device_err("self-signed certificate", e))?;

            let certificate = Certificate::read(&mut self.inner, SlotId::Signature)
                .map_err(|e| device_err("certificate readback", e))?;
            Ok(certificate.into_buffer().to_vec())
        }
    }
}
