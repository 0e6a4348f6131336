//! Command builder for ipfs-deploy.

use std::path::PathBuf;

/// Builder for ipfs-deploy commands.
#[derive(Debug, Clone)]
pub struct IpfsDeployCmdBuilder {
    program: String,
    path: PathBuf,
    pinners: Vec<String>,
    site_domain: Option<String>,
    no_open: bool,
    no_clipboard: bool,
    extra_args: Vec<String>,
}

impl IpfsDeployCmdBuilder {
    /// Create a new ipfs-deploy command builder for the directory at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            program: "ipfs-deploy".to_string(),
            path: path.into(),
            pinners: Vec::new(),
            site_domain: None,
            no_open: true,
            no_clipboard: true,
            extra_args: Vec::new(),
        }
    }

    /// Set the executable to run.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Add a pinning backend by name.
    pub fn pinner(mut self, name: impl Into<String>) -> Self {
        self.pinners.push(name.into());
        self
    }

    /// Set the label the upload is filed under.
    pub fn site_domain(mut self, domain: impl Into<String>) -> Self {
        self.site_domain = Some(domain.into());
        self
    }

    /// Add extra arguments.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the command as a vector of strings, program first.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![self.program];

        for pinner in self.pinners {
            cmd.push("--pinner".to_string());
            cmd.push(pinner);
        }

        if let Some(domain) = self.site_domain {
            cmd.push("--site-domain".to_string());
            cmd.push(domain);
        }

        if self.no_open {
            cmd.push("--no-open".to_string());
        }
        if self.no_clipboard {
            cmd.push("--no-clipboard".to_string());
        }

        cmd.extend(self.extra_args);
        cmd.push(self.path.to_string_lossy().into_owned());

        cmd
    }
}
