//! Property-based checks for the chunked AEAD codec (§8 "Codec
//! properties"): round-trip, the size law, range-decrypt equivalence,
//! tamper detection and nonce determinism, for arbitrary keys, base
//! nonces and plaintexts.

mod codec_properties {
    use proptest::prelude::*;

    use vaultgate_core::crypto::chunked_aead::{
        chunk_nonce, chunk_range_for, ciphertext_byte_range, decrypt_range_stream, decrypt_stream,
        encrypt_stream, encrypted_len,
    };

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn round_trip(key in any::<[u8; 32]>(), base_nonce in any::<[u8; 12]>(), plaintext in prop::collection::vec(any::<u8>(), 0..200_000)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ct = Vec::new();
                let total = encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct).await.unwrap();
                prop_assert_eq!(total as usize, plaintext.len());

                let mut pt = Vec::new();
                decrypt_stream(&key, &base_nonce, ct.as_slice(), &mut pt).await.unwrap();
                prop_assert_eq!(pt, plaintext);
                Ok(())
            })?;
        }

        #[test]
        fn size_law_holds(plaintext in prop::collection::vec(any::<u8>(), 0..200_000)) {
            let key = [0x11u8; 32];
            let base_nonce = [0x22u8; 12];
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ct = Vec::new();
                encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct).await.unwrap();
                prop_assert_eq!(ct.len() as u64, encrypted_len(plaintext.len() as u64));
                Ok(())
            })?;
        }

        #[test]
        fn range_decrypt_matches_plaintext_slice(
            plaintext in prop::collection::vec(any::<u8>(), 1..200_000),
            start_frac in 0.0f64..1.0,
            len_frac in 0.0f64..1.0,
        ) {
            let key = [0x33u8; 32];
            let base_nonce = [0x44u8; 12];
            let start = (start_frac * plaintext.len() as f64) as u64;
            let max_len = plaintext.len() as u64 - start;
            let length = ((len_frac * max_len as f64) as u64).max(1).min(max_len);

            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ct = Vec::new();
                encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct).await.unwrap();

                let (start_chunk, end_chunk) = chunk_range_for(start, length).unwrap();
                let (ct_off, ct_len) = ciphertext_byte_range(plaintext.len() as u64, start_chunk, end_chunk);
                let slice = &ct[ct_off as usize..(ct_off + ct_len) as usize];
                let skip_front = start - start_chunk * 65536;

                let mut out = Vec::new();
                decrypt_range_stream(&key, &base_nonce, start_chunk, plaintext.len() as u64, slice, &mut out, skip_front, length)
                    .await
                    .unwrap();
                prop_assert_eq!(out, plaintext[start as usize..(start + length) as usize].to_vec());
                Ok(())
            })?;
        }

        #[test]
        fn tamper_detection(key in any::<[u8; 32]>(), base_nonce in any::<[u8; 12]>(), plaintext in prop::collection::vec(any::<u8>(), 1..10_000), flip_offset in 0usize..10_000) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ct = Vec::new();
                encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct).await.unwrap();

                let idx = flip_offset % ct.len();
                ct[idx] ^= 0x01;

                let mut pt = Vec::new();
                let result = decrypt_stream(&key, &base_nonce, ct.as_slice(), &mut pt).await;
                prop_assert!(result.is_err());
                Ok(())
            })?;
        }

        #[test]
        fn nonce_derivation_is_deterministic(base_nonce in any::<[u8; 12]>(), index in any::<u64>()) {
            let a = chunk_nonce(&base_nonce, index);
            let b = chunk_nonce(&base_nonce, index);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn encryption_is_deterministic_for_same_key_and_nonce(key in any::<[u8; 32]>(), base_nonce in any::<[u8; 12]>(), plaintext in prop::collection::vec(any::<u8>(), 0..20_000)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ct1 = Vec::new();
                encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct1).await.unwrap();
                let mut ct2 = Vec::new();
                encrypt_stream(&key, &base_nonce, plaintext.as_slice(), &mut ct2).await.unwrap();
                prop_assert_eq!(ct1, ct2);
                Ok(())
            })?;
        }
    }
}
