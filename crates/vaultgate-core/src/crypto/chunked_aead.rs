//! Chunked AEAD stream codec (C1).
//!
//! Plaintext is partitioned into fixed 65536-byte chunks, each sealed
//! independently under AES-256-GCM with a nonce derived deterministically
//! from a per-file base nonce and the chunk index. There is no header and
//! no associated data — see the module docs on [`chunk_nonce`] for the
//! exact derivation.

use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::CryptoError;

/// Plaintext chunk size in bytes.
pub const CHUNK_SIZE: usize = 65536;
/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;
/// Nonce size in bytes (AES-GCM standard nonce).
pub const NONCE_SIZE: usize = 12;
/// Key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Derive the per-chunk nonce: `base[0..4] ++ (base[4..12] XOR BE(index))`.
pub fn chunk_nonce(base_nonce: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base_nonce;
    let index_be = index.to_be_bytes();
    for i in 0..8 {
        nonce[4 + i] ^= index_be[i];
    }
    nonce
}

/// Pure size-law function: ciphertext length for a given plaintext length.
pub fn encrypted_len(plaintext_len: u64) -> u64 {
    if plaintext_len == 0 {
        return 0;
    }
    let chunks = plaintext_len.div_ceil(CHUNK_SIZE as u64);
    plaintext_len + chunks * TAG_SIZE as u64
}

/// Number of chunks a plaintext of the given length is split into.
pub fn chunk_count(plaintext_len: u64) -> u64 {
    if plaintext_len == 0 {
        0
    } else {
        plaintext_len.div_ceil(CHUNK_SIZE as u64)
    }
}

/// Ciphertext length of the chunk at `index`, given the total plaintext
/// length. Every chunk but the last is a full `CHUNK_SIZE + TAG_SIZE`.
pub fn chunk_ciphertext_len(total_plaintext_len: u64, index: u64) -> usize {
    let last_index = chunk_count(total_plaintext_len).saturating_sub(1);
    let plain_len = if index == last_index {
        let rem = total_plaintext_len % CHUNK_SIZE as u64;
        if rem == 0 { CHUNK_SIZE as u64 } else { rem }
    } else {
        CHUNK_SIZE as u64
    };
    plain_len as usize + TAG_SIZE
}

/// Which chunk index covers plaintext offset `offset`.
pub fn chunk_index_for_offset(offset: u64) -> u64 {
    offset / CHUNK_SIZE as u64
}

/// Ciphertext `(offset, length)` spanning chunks `[start_chunk, end_chunk]`
/// inclusive, given the total plaintext length.
pub fn ciphertext_byte_range(total_plaintext_len: u64, start_chunk: u64, end_chunk: u64) -> (u64, u64) {
    let mut offset = 0u64;
    for i in 0..start_chunk {
        offset += chunk_ciphertext_len(total_plaintext_len, i) as u64;
    }
    let mut len = 0u64;
    for i in start_chunk..=end_chunk {
        len += chunk_ciphertext_len(total_plaintext_len, i) as u64;
    }
    (offset, len)
}

/// Chunk index range covering plaintext byte range `[start, start+length)`.
/// Returns `None` for a zero-length range.
pub fn chunk_range_for(start: u64, length: u64) -> Option<(u64, u64)> {
    if length == 0 {
        return None;
    }
    let start_chunk = chunk_index_for_offset(start);
    let end_chunk = chunk_index_for_offset(start + length - 1);
    Some((start_chunk, end_chunk))
}

fn cipher(key: &[u8; KEY_SIZE]) -> Aes256Gcm {
    Aes256Gcm::new_from_slice(key).expect("32-byte key is always valid for AES-256-GCM")
}

/// Seal a single chunk. No associated data.
pub fn encrypt_chunk(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    cipher(key)
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad: &[] })
        .expect("AES-256-GCM encryption of a bounded chunk never fails")
}

/// Open a single chunk. Any failure collapses to the single opaque
/// [`CryptoError::DecryptFailed`] kind — never leak which chunk or nonce.
pub fn decrypt_chunk(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher(key)
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Read from `reader` until `buf` is full or EOF, returning the number of
/// bytes actually read. Unlike `read_exact`, a short final read is not an
/// error — it signals the last, possibly-partial chunk.
async fn read_up_to<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Encrypt `reader`'s entire plaintext stream into `writer`, chunk by
/// chunk. Returns the total plaintext byte count observed.
///
/// A zero-length input produces a zero-length output (no chunks at all),
/// per the size law.
pub async fn encrypt_stream<R, W>(
    key: &[u8; KEY_SIZE],
    base_nonce: &[u8; NONCE_SIZE],
    mut reader: R,
    mut writer: W,
) -> Result<u64, CryptoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    let mut index = 0u64;
    loop {
        let n = read_up_to(&mut reader, &mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        let nonce = chunk_nonce(base_nonce, index);
        let ct = encrypt_chunk(key, &nonce, &buf[..n]);
        writer.write_all(&ct).await?;
        index += 1;
        if n < CHUNK_SIZE {
            break;
        }
    }
    writer.flush().await?;
    Ok(total)
}

/// Decrypt the full ciphertext stream from `reader` into `writer`.
pub async fn decrypt_stream<R, W>(
    key: &[u8; KEY_SIZE],
    base_nonce: &[u8; NONCE_SIZE],
    mut reader: R,
    mut writer: W,
) -> Result<(), CryptoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE + TAG_SIZE];
    let mut index = 0u64;
    loop {
        let n = read_up_to(&mut reader, &mut buf).await?;
        if n == 0 {
            break;
        }
        let nonce = chunk_nonce(base_nonce, index);
        let pt = decrypt_chunk(key, &nonce, &buf[..n])?;
        writer.write_all(&pt).await?;
        index += 1;
    }
    writer.flush().await?;
    Ok(())
}

/// Decrypt chunks `[start_chunk, ..]` from `reader` (which must yield
/// exactly the ciphertext bytes for those chunks, in order), trimming
/// `skip_front` bytes from the first decrypted chunk and emitting exactly
/// `take` plaintext bytes total into `writer`.
pub async fn decrypt_range_stream<R, W>(
    key: &[u8; KEY_SIZE],
    base_nonce: &[u8; NONCE_SIZE],
    start_chunk: u64,
    total_plaintext_len: u64,
    mut reader: R,
    mut writer: W,
    skip_front: u64,
    take: u64,
) -> Result<(), CryptoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = take;
    let mut skip = skip_front as usize;
    let mut index = start_chunk;
    let last_index = chunk_count(total_plaintext_len).saturating_sub(1);

    while remaining > 0 && index <= last_index {
        let ct_len = chunk_ciphertext_len(total_plaintext_len, index);
        let mut buf = vec![0u8; ct_len];
        reader.read_exact(&mut buf).await?;
        let nonce = chunk_nonce(base_nonce, index);
        let pt = decrypt_chunk(key, &nonce, &buf)?;

        let start = skip.min(pt.len());
        skip = skip.saturating_sub(pt.len());
        let available = &pt[start..];
        let take_from_chunk = (remaining as usize).min(available.len());
        writer.write_all(&available[..take_from_chunk]).await?;
        remaining -= take_from_chunk as u64;
        index += 1;
    }
    writer.flush().await?;
    Ok(())
}

/// Marker types used by the proxy to describe which side of a chunked
/// stream a handle represents; kept as a documentation anchor rather than
/// a runtime type, since the proxy builds concrete `DuplexStream` pipes
/// directly.
pub struct ChunkedReader;
pub struct ChunkedWriter;
