//! In-process 9P server for tests.
//!
//! [`TestFs`] is a tiny scripted file tree served over one half of a
//! [`UnixStream::pair`], so client code can be exercised against real
//! framing without a wmii instance.  The serving thread runs until the
//! client closes its end.  Shared logs record every read, write, and
//! create so tests can assert on the traffic.

use super::client::{Conn, Fsys};
use super::proto::{self, Message, Qid, Stat, DMDIR, QTDIR};
use super::NinepError;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::thread;

pub(crate) struct TestFs {
    files: HashMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    fail_open: HashSet<String>,
    short_writes: HashSet<String>,
    msize: u32,
    version: String,
    writes: Arc<Mutex<Vec<(String, u64, Vec<u8>)>>>,
    reads: Arc<Mutex<Vec<String>>>,
    creates: Arc<Mutex<Vec<String>>>,
}

impl TestFs {
    pub fn new() -> TestFs {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        TestFs {
            files: HashMap::new(),
            dirs,
            fail_open: HashSet::new(),
            short_writes: HashSet::new(),
            msize: proto::MAX_MSIZE,
            version: proto::VERSION.to_string(),
            writes: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(Mutex::new(Vec::new())),
            creates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a file (ancestor directories are created implicitly).
    pub fn file(mut self, path: &str, content: &str) -> TestFs {
        self.note_ancestors(path);
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    /// Register an empty directory.
    pub fn dir(mut self, path: &str) -> TestFs {
        self.note_ancestors(path);
        self.dirs.insert(path.to_string());
        self
    }

    /// Register a file whose open always fails with an `Rerror`.
    pub fn fail_open(mut self, path: &str) -> TestFs {
        self = self.file(path, "");
        self.fail_open.insert(path.to_string());
        self
    }

    /// Answer writes to `path` with a count one byte short.
    pub fn short_write(mut self, path: &str) -> TestFs {
        self.short_writes.insert(path.to_string());
        self
    }

    /// Cap the msize granted during version negotiation.
    pub fn msize(mut self, msize: u32) -> TestFs {
        self.msize = msize;
        self
    }

    /// Answer `Tversion` with this protocol version string.
    pub fn version_reply(mut self, version: &str) -> TestFs {
        self.version = version.to_string();
        self
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<(String, u64, Vec<u8>)>>> {
        Arc::clone(&self.writes)
    }

    pub fn reads(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.reads)
    }

    pub fn creates(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.creates)
    }

    /// Spawn the serving thread and hand back an attached client.
    pub fn connect(self) -> Fsys {
        self.try_connect().expect("test server handshake")
    }

    pub fn try_connect(self) -> Result<Fsys, NinepError> {
        let (client, server) = UnixStream::pair()?;
        thread::spawn(move || serve(self, server));
        Conn::from_stream(client)?.attach("", "")
    }

    fn note_ancestors(&mut self, path: &str) {
        let mut p = path;
        while let Some(i) = p.rfind('/') {
            let parent = if i == 0 { "/" } else { &p[..i] };
            self.dirs.insert(parent.to_string());
            if i == 0 {
                break;
            }
            p = &p[..i];
        }
    }

    fn handle(&mut self, fids: &mut HashMap<u32, String>, msg: Message) -> Message {
        match msg {
            Message::Tversion { msize, .. } => Message::Rversion {
                msize: msize.min(self.msize),
                version: self.version.clone(),
            },
            Message::Tattach { fid, .. } => {
                fids.insert(fid, "/".to_string());
                Message::Rattach {
                    qid: Qid {
                        kind: QTDIR,
                        ..Qid::default()
                    },
                }
            }
            Message::Twalk { fid, newfid, names } => {
                let Some(base) = fids.get(&fid).cloned() else {
                    return err("unknown fid");
                };
                let mut path = base;
                let mut qids = Vec::new();
                for name in &names {
                    let next = join(&path, name);
                    match self.qid_of(&next) {
                        Some(q) => {
                            qids.push(q);
                            path = next;
                        }
                        None => break,
                    }
                }
                if qids.len() == names.len() {
                    fids.insert(newfid, path);
                    Message::Rwalk { qids }
                } else if qids.is_empty() {
                    err("file does not exist")
                } else {
                    Message::Rwalk { qids }
                }
            }
            Message::Topen { fid, .. } => match fids.get(&fid) {
                Some(p) if self.fail_open.contains(p.as_str()) => err("permission denied"),
                Some(_) => Message::Ropen {
                    qid: Qid::default(),
                    iounit: 0,
                },
                None => err("unknown fid"),
            },
            Message::Tcreate { fid, name, .. } => {
                let Some(dir) = fids.get(&fid).cloned() else {
                    return err("unknown fid");
                };
                let path = join(&dir, &name);
                self.creates.lock().unwrap().push(path.clone());
                self.files.insert(path.clone(), Vec::new());
                // The fid now names the new file, open for writing.
                fids.insert(fid, path);
                Message::Rcreate {
                    qid: Qid::default(),
                    iounit: 0,
                }
            }
            Message::Tread { fid, offset, count } => {
                let Some(path) = fids.get(&fid).cloned() else {
                    return err("unknown fid");
                };
                self.reads.lock().unwrap().push(path.clone());
                let data = if self.dirs.contains(&path) {
                    self.dir_bytes(&path)
                } else {
                    match self.files.get(&path) {
                        Some(content) => content.clone(),
                        None => return err("file does not exist"),
                    }
                };
                Message::Rread {
                    data: slice(&data, offset, count),
                }
            }
            Message::Twrite { fid, offset, data } => {
                let Some(path) = fids.get(&fid).cloned() else {
                    return err("unknown fid");
                };
                self.writes
                    .lock()
                    .unwrap()
                    .push((path.clone(), offset, data.clone()));
                if self.short_writes.contains(&path) {
                    return Message::Rwrite {
                        count: data.len().saturating_sub(1) as u32,
                    };
                }
                if let Some(content) = self.files.get_mut(&path) {
                    let off = offset as usize;
                    if content.len() < off + data.len() {
                        content.resize(off + data.len(), 0);
                    }
                    content[off..off + data.len()].copy_from_slice(&data);
                }
                Message::Rwrite {
                    count: data.len() as u32,
                }
            }
            Message::Tclunk { fid } => {
                fids.remove(&fid);
                Message::Rclunk
            }
            _ => err("unsupported message"),
        }
    }

    fn qid_of(&self, path: &str) -> Option<Qid> {
        if self.dirs.contains(path) {
            Some(Qid {
                kind: QTDIR,
                ..Qid::default()
            })
        } else if self.files.contains_key(path) {
            Some(Qid::default())
        } else {
            None
        }
    }

    fn dir_bytes(&self, dir: &str) -> Vec<u8> {
        let mut names: Vec<&str> = Vec::new();
        for d in &self.dirs {
            if parent_of(d) == Some(dir) {
                names.push(leaf(d));
            }
        }
        for f in self.files.keys() {
            if parent_of(f) == Some(dir) {
                names.push(leaf(f));
            }
        }
        names.sort_unstable();
        let mut out = Vec::new();
        for name in names {
            let full = join(dir, name);
            let is_dir = self.dirs.contains(&full);
            Stat {
                typ: 0,
                dev: 0,
                qid: if is_dir {
                    Qid {
                        kind: QTDIR,
                        ..Qid::default()
                    }
                } else {
                    Qid::default()
                },
                mode: if is_dir { DMDIR | 0o755 } else { 0o644 },
                atime: 0,
                mtime: 0,
                length: self.files.get(&full).map_or(0, |c| c.len() as u64),
                name: name.to_string(),
                uid: "wmii".to_string(),
                gid: "wmii".to_string(),
                muid: "wmii".to_string(),
            }
            .encode(&mut out);
        }
        out
    }
}

fn serve(mut fs: TestFs, mut stream: UnixStream) {
    let mut fids: HashMap<u32, String> = HashMap::new();
    while let Ok((tag, msg)) = proto::read_message(&mut stream, 1 << 20) {
        let reply = fs.handle(&mut fids, msg);
        if proto::write_message(&mut stream, tag, &reply).is_err() {
            return;
        }
    }
}

fn err(msg: &str) -> Message {
    Message::Rerror { ename: msg.to_string() }
}

fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// The `count`-byte window of `data` at `offset`, clamped to the data.
fn slice(data: &[u8], offset: u64, count: u32) -> Vec<u8> {
    let start = (offset as usize).min(data.len());
    let end = start.saturating_add(count as usize).min(data.len());
    data[start..end].to_vec()
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    let i = path.rfind('/')?;
    Some(if i == 0 { "/" } else { &path[..i] })
}

fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
