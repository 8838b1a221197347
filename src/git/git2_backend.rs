use chrono::{DateTime, Utc};
use git2::{
    Commit, Cred, CredentialType, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks,
    Repository, Signature, Time, build::RepoBuilder,
};
use std::cell::RefCell;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sequence::{CommitMessage, CommitSink};

/// Plain user/token pair offered to HTTPS remotes.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Committer identity written into the working copy's config.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub ssh_command: Option<String>,
}

/// Build `RemoteCallbacks` that answer credential requests.
///
/// User/token is offered when the remote accepts it; otherwise fall back to
/// the SSH agent, then to default credentials.
fn callbacks_with_creds(creds: Option<&Credentials>) -> RemoteCallbacks<'_> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(move |_url, username_from_url, allowed| {
        if let Some(c) = creds
            && allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
        {
            return Cred::userpass_plaintext(&c.username, &c.password);
        }
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });
    cb
}

/// The local working copy a run commits into.
pub struct Workspace {
    repo: Repository,
    identity: Option<Identity>,
}

impl Workspace {
    /// `git init <path>`.
    pub fn init(path: &Path) -> Result<Self> {
        let repo = Repository::init(path)
            .map_err(|e| Error::workspace(format!("git init {}", path.display()), e))?;
        Ok(Workspace {
            repo,
            identity: None,
        })
    }

    /// `git clone --single-branch -b <branch> <url> <path>`.
    ///
    /// The fetch refspec of `origin` is restricted to `branch`, so later
    /// fetches stay single-branch too.
    pub fn clone(
        url: &str,
        path: &Path,
        branch: &str,
        creds: Option<&Credentials>,
    ) -> Result<Self> {
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(callbacks_with_creds(creds));

        let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
        let mut builder = RepoBuilder::new();
        builder
            .branch(branch)
            .fetch_options(fo)
            .remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec));

        let repo = builder.clone(url, path).map_err(|e| {
            Error::workspace(
                format!("git clone --single-branch -b {branch} into {}", path.display()),
                e,
            )
        })?;
        Ok(Workspace {
            repo,
            identity: None,
        })
    }

    /// Write `user.name`, `user.email` and `core.sshCommand` into the
    /// repository config and use the identity for subsequent commits.
    pub fn configure(&mut self, identity: Identity) -> Result<()> {
        let wrap = |e: git2::Error| Error::workspace("git config", e);
        let mut cfg = self.repo.config().map_err(wrap)?;
        cfg.set_str("user.name", &identity.name).map_err(wrap)?;
        cfg.set_str("user.email", &identity.email).map_err(wrap)?;
        if let Some(cmd) = &identity.ssh_command {
            cfg.set_str("core.sshCommand", cmd).map_err(wrap)?;
        }
        self.identity = Some(identity);
        Ok(())
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Author dated at `when`, committer dated now, as `git commit --date` does.
    fn signatures(
        &self,
        when: DateTime<Utc>,
    ) -> std::result::Result<(Signature<'static>, Signature<'static>), git2::Error> {
        let (name, email) = match &self.identity {
            Some(id) => (id.name.clone(), id.email.clone()),
            None => {
                let sig = self.repo.signature()?;
                (
                    sig.name().unwrap_or_default().to_string(),
                    sig.email().unwrap_or_default().to_string(),
                )
            }
        };
        let author = Signature::new(&name, &email, &Time::new(when.timestamp(), 0))?;
        let committer = Signature::now(&name, &email)?;
        Ok((author, committer))
    }

    /// Push the current HEAD reference to `refs/heads/<branch>` on `url`.
    ///
    /// # Errors
    /// [`Error::Publish`] if the transport fails or the remote rejects the
    /// update (e.g. a non-fast-forward without `force`).
    pub fn push(
        &self,
        url: &str,
        branch: &str,
        force: bool,
        creds: Option<&Credentials>,
    ) -> Result<()> {
        let head = self
            .repo
            .head()
            .map_err(|e| Error::Publish(format!("nothing to push: {e}")))?;
        let src = head
            .name()
            .ok_or_else(|| Error::Publish("HEAD is not a valid reference".into()))?;
        let refspec = format!(
            "{}{src}:refs/heads/{branch}",
            if force { "+" } else { "" }
        );

        let rejected: RefCell<Vec<String>> = RefCell::new(Vec::new());
        {
            let mut cb = callbacks_with_creds(creds);
            cb.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejected.borrow_mut().push(format!("{refname}: {msg}"));
                }
                Ok(())
            });
            let mut opts = PushOptions::new();
            opts.remote_callbacks(cb);

            let mut remote = self
                .repo
                .remote_anonymous(url)
                .map_err(|e| Error::Publish(e.message().to_string()))?;
            remote
                .push(&[refspec.as_str()], Some(&mut opts))
                .map_err(|e| Error::Publish(e.message().to_string()))?;
        }

        let rejected = rejected.into_inner();
        if !rejected.is_empty() {
            return Err(Error::Publish(format!("rejected {}", rejected.join(", "))));
        }
        Ok(())
    }
}

impl CommitSink for Workspace {
    type Error = git2::Error;

    /// Equivalent of `git commit --allow-empty --date <when>`: the new tree
    /// is HEAD's tree, or the empty tree on an unborn branch.
    fn commit_empty(
        &mut self,
        message: &CommitMessage,
        when: DateTime<Utc>,
    ) -> std::result::Result<String, git2::Error> {
        let (author, committer) = self.signatures(when)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e),
        };
        let tree = match &parent {
            Some(c) => c.tree()?,
            None => {
                let oid = self.repo.treebuilder(None)?.write()?;
                self.repo.find_tree(oid)?
            }
        };
        let parents: Vec<&Commit> = parent.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &author,
            &committer,
            &message.to_git_message(),
            &tree,
            &parents,
        )?;
        Ok(oid.to_string())
    }
}
