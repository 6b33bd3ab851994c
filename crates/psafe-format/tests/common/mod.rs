//! Builds encrypted PWS3 containers for the integration tests.

#![allow(dead_code)]

use cipher::generic_array::GenericArray;
use cipher::{Block, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use hmac::{Hmac, Mac};
use psafe_crypto::{stretch_key, BLOCK_SIZE, KEY_SIZE, SALT_SIZE};
use psafe_format::{END_CODE, EOF_MARKER, TAG};
use secrecy::SecretString;
use sha2::Sha256;
use twofish::Twofish;

/// Size of the unencrypted preamble before the first field block.
pub const PREAMBLE_LEN: usize = 4 + SALT_SIZE + 4 + 32 + 32 + 32 + BLOCK_SIZE;

/// Size of the EOF marker plus the HMAC trailer.
pub const TRAILER_LEN: usize = BLOCK_SIZE + 32;

struct RawField {
    length: i32,
    code: u8,
    data: Vec<u8>,
}

pub struct ContainerBuilder {
    passphrase: String,
    iterations: i32,
    salt: [u8; SALT_SIZE],
    session_key: [u8; KEY_SIZE],
    hmac_key: [u8; KEY_SIZE],
    iv: [u8; BLOCK_SIZE],
    fields: Vec<RawField>,
    tamper_hmac: bool,
    omit_trailer: bool,
}

impl ContainerBuilder {
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            iterations: 2048,
            salt: [0x11; SALT_SIZE],
            session_key: [0x22; KEY_SIZE],
            hmac_key: [0x33; KEY_SIZE],
            iv: [0x44; BLOCK_SIZE],
            fields: Vec::new(),
            tamper_hmac: false,
            omit_trailer: false,
        }
    }

    pub fn iterations(mut self, iterations: i32) -> Self {
        self.iterations = iterations;
        self
    }

    /// One field whose declared length is its data length.
    pub fn field(self, code: u8, data: &[u8]) -> Self {
        self.raw_field(data.len() as i32, code, data)
    }

    /// One field with an arbitrary declared length.
    pub fn raw_field(mut self, length: i32, code: u8, data: &[u8]) -> Self {
        self.fields.push(RawField {
            length,
            code,
            data: data.to_vec(),
        });
        self
    }

    pub fn end(self) -> Self {
        self.field(END_CODE, b"")
    }

    /// Fields followed by an END terminator.
    pub fn group(mut self, fields: &[(u8, &[u8])]) -> Self {
        for (code, data) in fields {
            self = self.field(*code, data);
        }
        self.end()
    }

    /// A minimal v3.13 header with a database name.
    pub fn header(self, name: &str) -> Self {
        self.group(&[(0x00, &[0x0d, 0x03]), (0x09, name.as_bytes())])
    }

    pub fn tamper_hmac(mut self) -> Self {
        self.tamper_hmac = true;
        self
    }

    /// Stop after the field blocks: no EOF marker, no HMAC.
    pub fn omit_trailer(mut self) -> Self {
        self.omit_trailer = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let passphrase = SecretString::from(self.passphrase.as_str());
        let stretched = stretch_key(&passphrase, &self.salt, self.iterations.max(0) as u32);

        let mut out = TAG.to_vec();
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iterations.to_le_bytes());
        out.extend_from_slice(&stretched.verifier());

        let wrap = Twofish::new_from_slice(stretched.as_bytes()).unwrap();
        for key in [&self.session_key, &self.hmac_key] {
            for half in key.chunks_exact(BLOCK_SIZE) {
                let mut block = Block::<Twofish>::clone_from_slice(half);
                wrap.encrypt_block(&mut block);
                out.extend_from_slice(&block);
            }
        }
        out.extend_from_slice(&self.iv);

        let mut enc =
            cbc::Encryptor::<Twofish>::new_from_slices(&self.session_key, &self.iv).unwrap();
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.hmac_key).unwrap();
        for field in &self.fields {
            mac.update(&field.data);
            for mut block in frame(field) {
                enc.encrypt_block_mut(GenericArray::from_mut_slice(&mut block));
                out.extend_from_slice(&block);
            }
        }

        if self.omit_trailer {
            return out;
        }

        out.extend_from_slice(&EOF_MARKER);
        let mut tag: [u8; 32] = mac.finalize().into_bytes().into();
        if self.tamper_hmac {
            tag[0] ^= 0x01;
        }
        out.extend_from_slice(&tag);
        out
    }
}

fn frame(field: &RawField) -> Vec<[u8; BLOCK_SIZE]> {
    let mut first = [0u8; BLOCK_SIZE];
    first[..4].copy_from_slice(&field.length.to_le_bytes());
    first[4] = field.code;
    let head = field.data.len().min(BLOCK_SIZE - 5);
    first[5..5 + head].copy_from_slice(&field.data[..head]);

    let mut blocks = vec![first];
    for chunk in field.data[head..].chunks(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        blocks.push(block);
    }
    blocks
}

pub fn time(secs: i32) -> [u8; 4] {
    secs.to_le_bytes()
}
