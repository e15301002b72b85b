//! Blocking 9P client.
//!
//! [`Conn`] owns the socket and the tag/fid counters; [`Fsys`] is the
//! attached file system the rest of the crate talks to.  Every operation on
//! [`Fsys`] is path-based: walk a fresh fid from the root, do the I/O,
//! clunk the fid.  wmii control files are small and short-lived, so the
//! extra walk per operation costs nothing and saves us from tracking open
//! handles.

use super::proto::{
    self, Message, Stat, IOHDRSZ, MAXWELEM, MAX_MSIZE, NOFID, NOTAG, OREAD, OWRITE, VERSION,
};
use super::NinepError;
use log::debug;
use std::os::unix::net::UnixStream;
use std::path::Path;

/// A 9P connection with a negotiated version but no attached root.
#[derive(Debug)]
pub struct Conn {
    stream: UnixStream,
    msize: u32,
    next_tag: u16,
    next_fid: u32,
}

impl Conn {
    /// Connect to the 9P server listening on the Unix socket at `path` and
    /// negotiate the protocol version.
    pub fn dial(path: &Path) -> Result<Conn, NinepError> {
        let stream = UnixStream::connect(path)?;
        Conn::from_stream(stream)
    }

    /// Run the version handshake over an already-connected stream.
    pub(crate) fn from_stream(stream: UnixStream) -> Result<Conn, NinepError> {
        let mut conn = Conn {
            stream,
            msize: MAX_MSIZE,
            next_tag: 0,
            next_fid: 0,
        };
        conn.negotiate()?;
        Ok(conn)
    }

    fn negotiate(&mut self) -> Result<(), NinepError> {
        proto::write_message(
            &mut self.stream,
            NOTAG,
            &Message::Tversion {
                msize: MAX_MSIZE,
                version: VERSION.into(),
            },
        )?;
        let (tag, reply) = proto::read_message(&mut self.stream, self.msize)?;
        if tag != NOTAG {
            return Err(NinepError::Malformed("version reply tag mismatch"));
        }
        match reply {
            Message::Rversion { msize, version } => {
                if version != VERSION {
                    return Err(NinepError::Version(version));
                }
                // An msize with no room for payload would wedge the read
                // loop below.
                if msize < IOHDRSZ + 8 {
                    return Err(NinepError::Malformed("server msize too small"));
                }
                self.msize = self.msize.min(msize);
                Ok(())
            }
            Message::Rerror { ename } => Err(NinepError::Server(ename)),
            other => Err(NinepError::Unexpected {
                want: "Rversion",
                got: other.name(),
            }),
        }
    }

    /// Attach to the server's root, consuming the connection.
    ///
    /// wmii ignores both the user and attach names, so empty strings are
    /// fine.  On failure the connection is dropped, which closes the
    /// socket.
    pub fn attach(mut self, uname: &str, aname: &str) -> Result<Fsys, NinepError> {
        let root = self.fresh_fid();
        match self.rpc(Message::Tattach {
            fid: root,
            afid: NOFID,
            uname: uname.into(),
            aname: aname.into(),
        })? {
            Message::Rattach { .. } => Ok(Fsys { conn: self, root }),
            other => Err(NinepError::Unexpected {
                want: "Rattach",
                got: other.name(),
            }),
        }
    }

    /// Issue one request and wait for its reply.
    ///
    /// `Rerror` replies become [`NinepError::Server`]; anything else is
    /// returned for the caller to match.
    fn rpc(&mut self, req: Message) -> Result<Message, NinepError> {
        let tag = self.fresh_tag();
        proto::write_message(&mut self.stream, tag, &req)?;
        let (rtag, reply) = proto::read_message(&mut self.stream, self.msize)?;
        if rtag != tag {
            return Err(NinepError::Malformed("reply tag mismatch"));
        }
        if let Message::Rerror { ename } = reply {
            return Err(NinepError::Server(ename));
        }
        Ok(reply)
    }

    fn fresh_tag(&mut self) -> u16 {
        let tag = self.next_tag;
        self.next_tag = match self.next_tag.wrapping_add(1) {
            NOTAG => 0,
            t => t,
        };
        tag
    }

    fn fresh_fid(&mut self) -> u32 {
        let fid = self.next_fid;
        self.next_fid = match self.next_fid.wrapping_add(1) {
            NOFID => 0,
            f => f,
        };
        fid
    }
}

/// An attached 9P file system.
#[derive(Debug)]
pub struct Fsys {
    conn: Conn,
    root: u32,
}

impl Fsys {
    /// Read the entire file at `path`.
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, NinepError> {
        let (fid, iounit) = self.open(path, OREAD)?;
        let result = self.read_to_end(fid, iounit);
        self.release(fid);
        result
    }

    /// Read the directory at `path` and parse its entries.
    pub fn read_dir(&mut self, path: &str) -> Result<Vec<Stat>, NinepError> {
        let data = self.read(path)?;
        proto::parse_dir(&data)
    }

    /// Overwrite the file at `path` with `data`, starting at offset zero.
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<(), NinepError> {
        let (fid, iounit) = self.open(path, OWRITE)?;
        let result = self.write_chunks(fid, iounit, data);
        self.release(fid);
        result
    }

    /// Create the file at `path` inside its (existing) parent directory and
    /// write `data` to it.
    pub fn create(&mut self, path: &str, data: &[u8]) -> Result<(), NinepError> {
        let (parent, name) = match path.rfind('/') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => ("", path),
        };
        let fid = self.walk(parent)?;
        let result = self.create_and_write(fid, name, data);
        self.release(fid);
        result
    }

    //  Fid plumbing

    /// Walk a fresh fid to `path` and open it.  The caller owns the fid and
    /// must [`release`](Fsys::release) it.
    fn open(&mut self, path: &str, mode: u8) -> Result<(u32, u32), NinepError> {
        let fid = self.walk(path)?;
        match self.open_fid(fid, mode) {
            Ok(iounit) => Ok((fid, iounit)),
            Err(e) => {
                self.release(fid);
                Err(e)
            }
        }
    }

    fn open_fid(&mut self, fid: u32, mode: u8) -> Result<u32, NinepError> {
        match self.conn.rpc(Message::Topen { fid, mode })? {
            Message::Ropen { iounit, .. } => Ok(iounit),
            other => Err(NinepError::Unexpected {
                want: "Ropen",
                got: other.name(),
            }),
        }
    }

    fn create_and_write(&mut self, fid: u32, name: &str, data: &[u8]) -> Result<(), NinepError> {
        // After Rcreate the fid refers to the new file, already open for
        // writing.
        let iounit = match self.conn.rpc(Message::Tcreate {
            fid,
            name: name.into(),
            perm: 0o777,
            mode: OWRITE,
        })? {
            Message::Rcreate { iounit, .. } => iounit,
            other => {
                return Err(NinepError::Unexpected {
                    want: "Rcreate",
                    got: other.name(),
                })
            }
        };
        self.write_chunks(fid, iounit, data)
    }

    /// Walk a fresh fid from the root to `path` (`""` or `"/"` clones the
    /// root itself).  Walks longer than [`MAXWELEM`] names are split into
    /// several Twalk messages.
    fn walk(&mut self, path: &str) -> Result<u32, NinepError> {
        let names: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let newfid = self.conn.fresh_fid();
        let mut from = self.root;
        let mut chunks = names.chunks(MAXWELEM);
        loop {
            let chunk = chunks.next().unwrap_or_default();
            let reply = self.conn.rpc(Message::Twalk {
                fid: from,
                newfid,
                names: chunk.iter().map(|s| s.to_string()).collect(),
            });
            let qids = match reply {
                Ok(Message::Rwalk { qids }) => qids,
                Ok(other) => {
                    self.abandon_walk(from, newfid);
                    return Err(NinepError::Unexpected {
                        want: "Rwalk",
                        got: other.name(),
                    });
                }
                Err(e) => {
                    self.abandon_walk(from, newfid);
                    return Err(e);
                }
            };
            if qids.len() != chunk.len() {
                // A partial Rwalk means some path element does not exist.
                self.abandon_walk(from, newfid);
                return Err(NinepError::NotFound(path.to_string()));
            }
            from = newfid;
            if chunks.len() == 0 {
                return Ok(newfid);
            }
        }
    }

    /// Clunk a half-walked fid, but only if an earlier Twalk established it.
    fn abandon_walk(&mut self, from: u32, newfid: u32) {
        if from == newfid {
            self.release(newfid);
        }
    }

    fn read_to_end(&mut self, fid: u32, iounit: u32) -> Result<Vec<u8>, NinepError> {
        let chunk = self.chunk_size(iounit);
        let mut data = Vec::new();
        loop {
            match self.conn.rpc(Message::Tread {
                fid,
                offset: data.len() as u64,
                count: chunk,
            })? {
                Message::Rread { data: part } if part.is_empty() => return Ok(data),
                Message::Rread { data: part } => data.extend_from_slice(&part),
                other => {
                    return Err(NinepError::Unexpected {
                        want: "Rread",
                        got: other.name(),
                    })
                }
            }
        }
    }

    fn write_chunks(&mut self, fid: u32, iounit: u32, data: &[u8]) -> Result<(), NinepError> {
        let chunk = self.chunk_size(iounit) as usize;
        let mut offset = 0u64;
        for part in data.chunks(chunk) {
            let count = match self.conn.rpc(Message::Twrite {
                fid,
                offset,
                data: part.to_vec(),
            })? {
                Message::Rwrite { count } => count,
                other => {
                    return Err(NinepError::Unexpected {
                        want: "Rwrite",
                        got: other.name(),
                    })
                }
            };
            if count as usize != part.len() {
                return Err(NinepError::ShortWrite);
            }
            offset += part.len() as u64;
        }
        Ok(())
    }

    /// Largest payload a single Tread/Twrite may carry on this connection.
    fn chunk_size(&self, iounit: u32) -> u32 {
        let max = self.conn.msize - IOHDRSZ;
        if iounit == 0 || iounit > max {
            max
        } else {
            iounit
        }
    }

    /// Clunk `fid`, logging instead of failing: by the time a fid is
    /// released the caller's operation already has its result.
    fn release(&mut self, fid: u32) {
        if let Err(e) = self.clunk(fid) {
            debug!("clunk fid {}: {}", fid, e);
        }
    }

    fn clunk(&mut self, fid: u32) -> Result<(), NinepError> {
        match self.conn.rpc(Message::Tclunk { fid })? {
            Message::Rclunk => Ok(()),
            other => Err(NinepError::Unexpected {
                want: "Rclunk",
                got: other.name(),
            }),
        }
    }
}

impl Drop for Fsys {
    fn drop(&mut self) {
        let root = self.root;
        self.release(root);
    }
}

//  Tests
