//! Cluster certificates as files to write on a node.
//!
//! Issuing and storing certificates happens elsewhere; this module only knows
//! where kubeadm expects each one and how to turn them into [`File`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::File;

/// Default kubeadm certificates directory.
pub const DEFAULT_CERTIFICATES_DIR: &str = "/etc/kubernetes/pki";

const CERT_PERMISSIONS: &str = "0640";
const KEY_PERMISSIONS: &str = "0600";

/// What a certificate is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// Cluster certificate authority.
    #[serde(rename = "ca")]
    ClusterCa,
    /// etcd certificate authority.
    #[serde(rename = "etcd")]
    EtcdCa,
    /// Front proxy certificate authority.
    #[serde(rename = "proxy")]
    FrontProxyCa,
    /// Service account signing key pair.
    #[serde(rename = "sa")]
    ServiceAccount,
    /// Client certificate the API server uses towards etcd.
    #[serde(rename = "apiserver-etcd-client")]
    ApiServerEtcdClient,
}

impl Purpose {
    /// Certificate and key paths relative to the certificates directory.
    fn relative_paths(self) -> (&'static str, &'static str) {
        match self {
            Self::ClusterCa => ("ca.crt", "ca.key"),
            Self::EtcdCa => ("etcd/ca.crt", "etcd/ca.key"),
            Self::FrontProxyCa => ("front-proxy-ca.crt", "front-proxy-ca.key"),
            Self::ServiceAccount => ("sa.pub", "sa.key"),
            Self::ApiServerEtcdClient => {
                ("apiserver-etcd-client.crt", "apiserver-etcd-client.key")
            }
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClusterCa => "ca",
            Self::EtcdCa => "etcd",
            Self::FrontProxyCa => "proxy",
            Self::ServiceAccount => "sa",
            Self::ApiServerEtcdClient => "apiserver-etcd-client",
        };
        f.write_str(name)
    }
}

/// PEM encoded certificate and private key.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("cert_len", &self.cert.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// A certificate and where it lives on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub purpose: Purpose,
    pub cert_file: String,
    pub key_file: String,
    /// Key material, `None` when it has not been looked up or generated.
    #[serde(default)]
    pub key_pair: Option<KeyPair>,
}

impl Certificate {
    /// Certificate for `purpose` at kubeadm's path under `dir`.
    #[must_use]
    pub fn new(purpose: Purpose, dir: &str) -> Self {
        let (cert, key) = purpose.relative_paths();
        let dir = dir.trim_end_matches('/');
        Self {
            purpose,
            cert_file: format!("{dir}/{cert}"),
            key_file: format!("{dir}/{key}"),
            key_pair: None,
        }
    }

    /// Attach key material.
    #[must_use]
    pub fn with_key_pair(mut self, cert: impl Into<String>, key: impl Into<String>) -> Self {
        self.key_pair = Some(KeyPair {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    /// Files for this certificate: the cert, then the key, skipping empty halves.
    #[must_use]
    pub fn as_files(&self) -> Vec<File> {
        let Some(pair) = &self.key_pair else {
            return Vec::new();
        };

        let mut files = Vec::with_capacity(2);
        if !pair.cert.is_empty() {
            files.push(File::root_owned(
                &self.cert_file,
                CERT_PERMISSIONS,
                &pair.cert,
            ));
        }
        if !pair.key.is_empty() {
            files.push(File::root_owned(&self.key_file, KEY_PERMISSIONS, &pair.key));
        }
        files
    }
}

/// An ordered set of certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Certificates(pub Vec<Certificate>);

impl Certificates {
    /// The certificates a control-plane node needs, without key material.
    #[must_use]
    pub fn control_plane(dir: &str) -> Self {
        Self(
            [
                Purpose::ClusterCa,
                Purpose::EtcdCa,
                Purpose::FrontProxyCa,
                Purpose::ServiceAccount,
            ]
            .into_iter()
            .map(|purpose| Certificate::new(purpose, dir))
            .collect(),
        )
    }

    /// Look up a certificate by purpose.
    #[must_use]
    pub fn get(&self, purpose: Purpose) -> Option<&Certificate> {
        self.0.iter().find(|c| c.purpose == purpose)
    }

    /// Mutable lookup by purpose.
    pub fn get_mut(&mut self, purpose: Purpose) -> Option<&mut Certificate> {
        self.0.iter_mut().find(|c| c.purpose == purpose)
    }

    /// Files for every certificate that carries key material, in order.
    #[must_use]
    pub fn as_files(&self) -> Vec<File> {
        self.0.iter().flat_map(Certificate::as_files).collect()
    }
}

impl FromIterator<Certificate> for Certificates {
    fn from_iter<T: IntoIterator<Item = Certificate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_plane_paths() {
        let certs = Certificates::control_plane(DEFAULT_CERTIFICATES_DIR);
        assert_eq!(certs.0.len(), 4);

        let etcd = certs.get(Purpose::EtcdCa).unwrap();
        assert_eq!(etcd.cert_file, "/etc/kubernetes/pki/etcd/ca.crt");
        assert_eq!(etcd.key_file, "/etc/kubernetes/pki/etcd/ca.key");

        let sa = certs.get(Purpose::ServiceAccount).unwrap();
        assert_eq!(sa.cert_file, "/etc/kubernetes/pki/sa.pub");
    }

    #[test]
    fn test_as_files_skips_missing_key_pairs() {
        let mut certs = Certificates::control_plane("/etc/kubernetes/pki/");
        assert!(certs.as_files().is_empty());

        let ca = certs.get_mut(Purpose::ClusterCa).unwrap();
        ca.key_pair = Some(KeyPair {
            cert: "CA CERT".to_string(),
            key: "CA KEY".to_string(),
        });
        let proxy = certs.get_mut(Purpose::FrontProxyCa).unwrap();
        proxy.key_pair = Some(KeyPair {
            cert: "PROXY CERT".to_string(),
            key: String::new(),
        });

        let files = certs.as_files();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/etc/kubernetes/pki/ca.crt",
                "/etc/kubernetes/pki/ca.key",
                "/etc/kubernetes/pki/front-proxy-ca.crt",
            ]
        );
        assert_eq!(files[0].permissions, "0640");
        assert_eq!(files[1].permissions, "0600");
        assert!(files.iter().all(|f| f.owner == "root:root"));
    }

    #[test]
    fn test_key_pair_debug_redacts_key() {
        let pair = KeyPair {
            cert: "cert".to_string(),
            key: "super-secret".to_string(),
        };
        assert!(!format!("{pair:?}").contains("super-secret"));
    }

    #[test]
    fn test_certificate_from_yaml() {
        let certs: Certificates = serde_yaml::from_str(
            "- purpose: ca\n  certFile: /pki/ca.crt\n  keyFile: /pki/ca.key\n  keyPair:\n    cert: C\n    key: K\n- purpose: apiserver-etcd-client\n  certFile: /pki/a.crt\n  keyFile: /pki/a.key\n",
        )
        .unwrap();
        assert_eq!(certs.0[0].purpose, Purpose::ClusterCa);
        assert_eq!(certs.0[1].purpose, Purpose::ApiServerEtcdClient);
        assert_eq!(certs.as_files().len(), 2);
    }
}
