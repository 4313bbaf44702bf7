//! End-to-end scenarios driven through the public crate API, as an
//! external adapter would use it: two independent vaults (distinct master
//! keys) sharing one remote blob store, connected only by a share archive.

use std::io::Cursor;

use tokio::io::AsyncReadExt;

use vaultgate_core::crypto::MasterKey;
use vaultgate_core::metadata::InMemoryMetadataStore;
use vaultgate_core::remote::memory::InMemoryRemoteStore;
use vaultgate_core::remote::RemoteStore;
use vaultgate_core::share::{export_share, import_share, ShareError};
use vaultgate_core::{Proxy, VaultPath};

type TestProxy = Proxy<InMemoryMetadataStore, InMemoryRemoteStore>;

fn vault(master_key: MasterKey) -> TestProxy {
    Proxy::new(InMemoryMetadataStore::new(), InMemoryRemoteStore::new(), master_key)
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(mut r: R) -> Vec<u8> {
    let mut out = Vec::new();
    r.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn scenario_6_share_import_across_vaults() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let master_a = MasterKey::from_bytes([0x00; 32]);
    let master_b = MasterKey::from_bytes([0xFF; 32]);

    let vault_a = vault(master_a);
    let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    vault_a
        .upload(&VaultPath::new("/report.pdf"), Cursor::new(body.clone()), Some(100_000))
        .await
        .unwrap();

    let vault_b = vault(master_b);

    let dir = tempfile::tempdir().unwrap();
    export_share(
        vault_a.metadata(),
        // Vault A and B share the remote store in this scenario, but the
        // share codec only ever touches metadata — it never sees `remote`.
        &MasterKey::from_bytes([0x00; 32]),
        &[VaultPath::root()],
        dir.path(),
        "hunter2",
    )
    .await
    .unwrap();

    import_share(vault_b.metadata(), &MasterKey::from_bytes([0xFF; 32]), dir.path(), "hunter2")
        .await
        .unwrap();

    // Re-point B's in-memory record at A's blob: both proxies were built
    // with independent `InMemoryRemoteStore`s, so for this in-process test
    // we copy the ciphertext object across by hand to stand in for "the
    // same remote blob store" the scenario assumes.
    let record = vault_b.stat(&VaultPath::new("/report.pdf")).await.unwrap().unwrap();
    let ciphertext = drain(vault_a.remote().get(&record.remote_name).await.unwrap()).await;
    vault_b.remote().put(&record.remote_name, Box::pin(Cursor::new(ciphertext)), None).await.unwrap();

    let downloaded = drain(vault_b.download(&VaultPath::new("/report.pdf")).await.unwrap()).await;
    assert_eq!(downloaded, body);
}

#[tokio::test]
async fn scenario_6_wrong_password_is_rejected() {
    let master_a = MasterKey::from_bytes([0x00; 32]);
    let vault_a = vault(master_a);
    vault_a.upload(&VaultPath::new("/report.pdf"), &b"secret contents"[..], Some(15)).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    export_share(
        vault_a.metadata(),
        &MasterKey::from_bytes([0x00; 32]),
        &[VaultPath::root()],
        dir.path(),
        "hunter2",
    )
    .await
    .unwrap();

    let master_b = MasterKey::from_bytes([0xFF; 32]);
    let vault_b = vault(master_b);
    let err = import_share(vault_b.metadata(), &MasterKey::from_bytes([0xFF; 32]), dir.path(), "hunter3")
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::AuthFailed));
    assert!(vault_b.stat(&VaultPath::new("/report.pdf")).await.unwrap().is_none());
}

#[tokio::test]
async fn upload_rename_delete_through_public_api() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let proxy = vault(MasterKey::random());
    proxy.upload(&VaultPath::new("/a/b.txt"), &b"hello"[..], Some(5)).await.unwrap();
    proxy.rename(&VaultPath::new("/a/b.txt"), &VaultPath::new("/a/c.txt")).await.unwrap();
    let downloaded = drain(proxy.download(&VaultPath::new("/a/c.txt")).await.unwrap()).await;
    assert_eq!(downloaded, b"hello");

    proxy.delete(&VaultPath::new("/a")).await.unwrap();
    assert!(proxy.stat(&VaultPath::new("/a/c.txt")).await.unwrap().is_none());
    assert!(proxy.list_children(&VaultPath::root()).await.unwrap().is_empty());
}
