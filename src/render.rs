//! Rendering of the realized configuration into the etcd environment file.
//!
//! A pure, deterministic mapping from [`RealizedConfig`] to the fixed
//! `ETCD_*` key set, plus the atomic write that persists it. The leading
//! blank line, quoting, and `true`/`false` booleans match the artifact
//! format existing etcd units already source.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::PassError;
use crate::reconcile::RealizedConfig;

/// Render the full artifact text. Identical inputs always yield
/// byte-identical output; there is no partial result.
pub fn render(realized: &RealizedConfig) -> Result<String, PassError> {
    if realized.name.is_empty() {
        return Err(PassError::Render("self instance id is empty".into()));
    }
    let etcd = &realized.etcd;
    let lines = [
        format!(
            r#"ETCD_INITIAL_CLUSTER_STATE="{}""#,
            realized.cluster_state
        ),
        format!(r#"ETCD_NAME="{}""#, realized.name),
        format!(
            r#"ETCD_INITIAL_CLUSTER="{}""#,
            realized.initial_cluster.join(",")
        ),
        format!(r#"ETCD_LISTEN_CLIENT_URLS="{}""#, realized.listen_client_url),
        format!(r#"ETCD_LISTEN_PEER_URLS="{}""#, realized.listen_peer_url),
        format!(
            r#"ETCD_INITIAL_ADVERTISE_PEER_URLS="{}""#,
            realized.advertise_peer_url
        ),
        format!(
            r#"ETCD_ADVERTISE_CLIENT_URLS="{}""#,
            realized.advertise_client_url
        ),
        format!("ETCD_TRUSTED_CA_FILE={}", etcd.client_ca_file),
        format!("ETCD_CERT_FILE={}", etcd.client_cert_file),
        format!("ETCD_KEY_FILE={}", etcd.client_key_file),
        format!("ETCD_CLIENT_CERT_AUTH={}", etcd.client_secure()),
        format!("ETCD_PEER_TRUSTED_CA_FILE={}", etcd.peer_ca_file),
        format!("ETCD_PEER_CERT_FILE={}", etcd.peer_cert_file),
        format!("ETCD_PEER_KEY_FILE={}", etcd.peer_key_file),
        format!("ETCD_PEER_CLIENT_CERT_AUTH={}", etcd.peer_secure()),
    ];

    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    out.push('\n');
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Write the artifact through a temp file in the target directory, then
/// rename over the final path, so the reading side never observes a
/// partial file. Mode 0700 matches the unit that sources it.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(contents.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o700))?;
    }
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtcdConfig;
    use crate::reconcile::ClusterState;
    use std::path::PathBuf;

    fn realized_new() -> RealizedConfig {
        RealizedConfig {
            etcd: EtcdConfig {
                env_file: PathBuf::from("/tmp/etcd-config"),
                client_scheme: "https".into(),
                client_port: "2379".into(),
                client_ca_file: String::new(),
                client_cert_file: String::new(),
                client_key_file: String::new(),
                peer_scheme: "https".into(),
                peer_port: "2380".into(),
                peer_ca_file: String::new(),
                peer_cert_file: String::new(),
                peer_key_file: String::new(),
            },
            cluster_state: ClusterState::New,
            initial_cluster: vec![
                "1=https://1.ec2.internal:2380".into(),
                "2=https://2.ec2.internal:2380".into(),
            ],
            name: "1".into(),
            listen_client_url: "https://0.0.0.0:2379".into(),
            listen_peer_url: "https://0.0.0.0:2380".into(),
            advertise_client_url: "https://1.ec2.internal:2379".into(),
            advertise_peer_url: "https://1.ec2.internal:2380".into(),
        }
    }

    #[test]
    fn renders_the_exact_artifact_bytes() {
        let expected = r#"
ETCD_INITIAL_CLUSTER_STATE="new"
ETCD_NAME="1"
ETCD_INITIAL_CLUSTER="1=https://1.ec2.internal:2380,2=https://2.ec2.internal:2380"
ETCD_LISTEN_CLIENT_URLS="https://0.0.0.0:2379"
ETCD_LISTEN_PEER_URLS="https://0.0.0.0:2380"
ETCD_INITIAL_ADVERTISE_PEER_URLS="https://1.ec2.internal:2380"
ETCD_ADVERTISE_CLIENT_URLS="https://1.ec2.internal:2379"
ETCD_TRUSTED_CA_FILE=
ETCD_CERT_FILE=
ETCD_KEY_FILE=
ETCD_CLIENT_CERT_AUTH=true
ETCD_PEER_TRUSTED_CA_FILE=
ETCD_PEER_CERT_FILE=
ETCD_PEER_KEY_FILE=
ETCD_PEER_CLIENT_CERT_AUTH=true
"#;
        assert_eq!(render(&realized_new()).unwrap(), expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let realized = realized_new();
        assert_eq!(render(&realized).unwrap(), render(&realized).unwrap());
    }

    #[test]
    fn tls_paths_and_cert_auth_follow_the_config() {
        let mut realized = realized_new();
        realized.etcd.client_ca_file = "/etc/etcd/certs/ca.pem".into();
        realized.etcd.peer_scheme = "http".into();

        let artifact = render(&realized).unwrap();
        assert!(artifact.contains("ETCD_TRUSTED_CA_FILE=/etc/etcd/certs/ca.pem\n"));
        assert!(artifact.contains("ETCD_CLIENT_CERT_AUTH=true\n"));
        assert!(artifact.contains("ETCD_PEER_CLIENT_CERT_AUTH=false\n"));
    }

    #[test]
    fn empty_self_name_is_a_render_error() {
        let mut realized = realized_new();
        realized.name = String::new();
        assert!(matches!(
            render(&realized),
            Err(PassError::Render(_))
        ));
    }

    #[test]
    fn write_atomic_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        write_atomic(&path, "first version with a longer body\n").unwrap();
        write_atomic(&path, "second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
