//! Minimal file encryption example, using the `symmetric::secret_box` API.
//!
//! This is only intended as an example to demonstrate usage of this library, and has not received
//! any independent review for security. The whole file is read into memory, and the key is stored
//! as plain hex on disk. **Please don't use this to encrypt your actual files!**
//!
//! ## Example usage:
//!
//! To generate a new key, writing it to "secret.key":
//!
//! ```bash
//! cargo run --example secret-box keygen secret.key
//! ```
//!
//! To encrypt "foo.txt" under that key, writing the result to "bar.enc":
//!
//! ```bash
//! cargo run --example secret-box encrypt secret.key foo.txt bar.enc
//! ```
//!
//! And to decrypt "bar.enc", writing the result to "baz.txt":
//!
//! ```bash
//! cargo run --example secret-box decrypt secret.key bar.enc baz.txt
//! ```

use anyhow::{bail, Context, Result};
use saltbox::encode::hex;
use saltbox::symmetric::secret_box;
use std::fs;
use std::path::Path;

/// Writes a freshly generated key to `dest`, hex-encoded.
fn keygen(dest: &Path) -> Result<()> {
    let key = secret_box::generate_key()?;
    fs::write(dest, hex::encode(&key[..])?)
        .with_context(|| format!("could not write key to {}", dest.display()))?;

    Ok(())
}

fn read_key(path: &Path) -> Result<secret_box::Key> {
    let encoded = fs::read_to_string(path)
        .with_context(|| format!("could not read key from {}", path.display()))?;
    let bytes = hex::decode(encoded.trim()).context("key file is not valid hex")?;

    Ok(secret_box::Key::try_from(&bytes[..])?)
}

/// Encrypts `source` under the key in `key_path`, writing `nonce || ciphertext` to `dest`.
fn encrypt_file(key_path: &Path, source: &Path, dest: &Path) -> Result<()> {
    let key = read_key(key_path)?;
    let message =
        fs::read(source).with_context(|| format!("could not read {}", source.display()))?;

    let nonce = secret_box::generate_nonce()?;
    let ciphertext = secret_box::create(&message, &nonce, &key[..])?;

    let mut output = nonce.to_vec();
    output.extend_from_slice(&ciphertext);
    fs::write(dest, output).with_context(|| format!("could not write {}", dest.display()))?;

    println!(
        "Encrypted {} bytes into {} bytes",
        message.len(),
        ciphertext.len() + secret_box::NONCE_LENGTH
    );

    Ok(())
}

/// Decrypts `source` (as written by `encrypt_file`) under the key in `key_path`.
fn decrypt_file(key_path: &Path, source: &Path, dest: &Path) -> Result<()> {
    let key = read_key(key_path)?;
    let input = fs::read(source).with_context(|| format!("could not read {}", source.display()))?;

    if input.len() < secret_box::NONCE_LENGTH {
        bail!("{} is too short to be an encrypted file", source.display());
    }

    let (nonce, ciphertext) = input.split_at(secret_box::NONCE_LENGTH);
    let message = secret_box::open(ciphertext, nonce, &key[..])
        .context("decryption failed: wrong key, or the file has been modified")?;

    fs::write(dest, &message).with_context(|| format!("could not write {}", dest.display()))?;
    println!("Decrypted {} bytes", message.len());

    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.get(1..).unwrap_or_default() {
        &["keygen", dest] => keygen(Path::new(dest)),
        &["encrypt", key, source, dest] => {
            encrypt_file(Path::new(key), Path::new(source), Path::new(dest))
        }
        &["decrypt", key, source, dest] => {
            decrypt_file(Path::new(key), Path::new(source), Path::new(dest))
        }
        _ => bail!(
            "usage: {} keygen KEY | encrypt KEY SOURCE DEST | decrypt KEY SOURCE DEST",
            args.first().copied().unwrap_or("secret-box")
        ),
    }
}
