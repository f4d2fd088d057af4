//! `AF_PACKET` socket bound to a single interface.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::time::Instant;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

/// Large enough for any frame on a standard or jumbo MTU link.
const RECV_BUF_LEN: usize = 65536;

// linux/if_packet.h
const PACKET_AUXDATA: libc::c_int = 8;
const TP_STATUS_VLAN_VALID: u32 = 1 << 4;
const TP_STATUS_VLAN_TPID_VALID: u32 = 1 << 6;

const ETH_P_8021Q: u16 = 0x8100;

/// Offset of the EtherType (or outer TPID) after destination and source MAC.
const TAG_OFFSET: usize = 12;

/// Control buffer in 8-byte words so `cmsghdr` alignment holds.
const CONTROL_WORDS: usize = 16;

/// `struct tpacket_auxdata`.
#[repr(C)]
#[allow(dead_code)]
#[derive(Clone, Copy, Debug, Default)]
struct AuxData {
    tp_status: u32,
    tp_len: u32,
    tp_snaplen: u32,
    tp_mac: u16,
    tp_net: u16,
    tp_vlan_tci: u16,
    tp_vlan_tpid: u16,
}

impl AuxData {
    /// The 802.1Q tag the kernel stripped on receive, as `(tpid, tci)`.
    fn vlan_tag(&self) -> Option<(u16, u16)> {
        if self.tp_status & TP_STATUS_VLAN_VALID == 0 {
            return None;
        }
        let tpid = if self.tp_status & TP_STATUS_VLAN_TPID_VALID != 0 {
            self.tp_vlan_tpid
        } else {
            ETH_P_8021Q
        };
        Some((tpid, self.tp_vlan_tci))
    }
}

struct Received {
    len: usize,
    outgoing: bool,
    vlan: Option<(u16, u16)>,
}

pub struct RawLink {
    socket: Socket,
    ifname: String,
    ifindex: u32,
}

impl RawLink {
    /// Open a raw packet socket receiving every protocol on `ifname`.
    pub fn open(ifname: &str) -> io::Result<Self> {
        let ifindex = ifindex(ifname)?;
        let protocol = (libc::ETH_P_ALL as u16).to_be();

        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(protocol as libc::c_int)),
        )?;
        socket.bind(&link_addr(ifindex, protocol)?)?;
        enable_auxdata(&socket)?;

        tracing::debug!(ifname, ifindex, "raw link opened");
        Ok(Self {
            socket,
            ifname: ifname.to_string(),
            ifindex,
        })
    }

    pub fn name(&self) -> &str {
        &self.ifname
    }

    pub fn index(&self) -> u32 {
        self.ifindex
    }

    /// Transmit `frame` unmodified on the bound interface.
    pub fn send(&self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(frame)?;
        if sent != frame.len() {
            return Err(io::Error::other(format!(
                "short write on {}: {sent} of {} bytes",
                self.ifname,
                frame.len()
            )));
        }
        Ok(())
    }

    /// Receive the next frame arriving on the interface before `deadline`.
    ///
    /// Frames transmitted by this host (`PACKET_OUTGOING`) are skipped. A
    /// VLAN tag the kernel moved into packet metadata is put back, so the
    /// frame reads as it was on the wire. Returns `Ok(None)` once the
    /// deadline passes.
    pub fn recv_incoming(&self, deadline: Instant) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        let mut control = [0u64; CONTROL_WORDS];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            let received = match self.recv_msg(&mut buf, &mut control) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(e) => return Err(e),
            };

            if received.outgoing {
                continue;
            }
            let mut frame = buf[..received.len].to_vec();
            if let Some((tpid, tci)) = received.vlan {
                restore_vlan_tag(&mut frame, tpid, tci);
            }
            return Ok(Some(frame));
        }
    }

    fn recv_msg(&self, buf: &mut [u8], control: &mut [u64]) -> io::Result<Received> {
        // SAFETY: all-zero is a valid `sockaddr_ll` and `msghdr`.
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: buf.len(),
        };
        msg.msg_name = (&mut addr as *mut libc::sockaddr_ll).cast();
        msg.msg_namelen = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = mem::size_of_val(control) as _;

        // SAFETY: every pointer in `msg` refers to a live buffer of the
        // length given next to it.
        let len = unsafe { libc::recvmsg(self.socket.as_raw_fd(), &mut msg, 0) };
        if len < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut vlan = None;
        // SAFETY: the kernel filled `msg_control` with `msg_controllen` bytes
        // of well-formed control messages; the CMSG macros stay inside it.
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                let hdr = &*cmsg;
                if hdr.cmsg_level == libc::SOL_PACKET && hdr.cmsg_type == PACKET_AUXDATA {
                    let aux = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<AuxData>());
                    vlan = aux.vlan_tag();
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }

        Ok(Received {
            len: len as usize,
            outgoing: addr.sll_pkttype as u32 == libc::PACKET_OUTGOING as u32,
            vlan,
        })
    }
}

/// Ask the kernel to report stripped VLAN tags with every received frame.
fn enable_auxdata(socket: &Socket) -> io::Result<()> {
    let enable: libc::c_int = 1;
    // SAFETY: `enable` outlives the call and the length matches its type.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_PACKET,
            PACKET_AUXDATA,
            (&enable as *const libc::c_int).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Insert an 802.1Q tag after the MAC addresses.
fn restore_vlan_tag(frame: &mut Vec<u8>, tpid: u16, tci: u16) {
    if frame.len() < TAG_OFFSET {
        return;
    }
    let mut tag = [0u8; 4];
    tag[..2].copy_from_slice(&tpid.to_be_bytes());
    tag[2..].copy_from_slice(&tci.to_be_bytes());
    frame.splice(TAG_OFFSET..TAG_OFFSET, tag);
}

fn ifindex(ifname: &str) -> io::Result<u32> {
    let name = CString::new(ifname)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::new(
            io::Error::last_os_error().kind(),
            format!("no such interface: {ifname}"),
        ));
    }
    Ok(index)
}

/// `sockaddr_ll` for binding to `ifindex` with a network-order protocol.
fn link_addr(ifindex: u32, protocol_be: u16) -> io::Result<SockAddr> {
    // SAFETY: the closure fully initializes a `sockaddr_ll`, which fits in the
    // zeroed storage provided by socket2, and reports its exact length.
    let ((), addr) = unsafe {
        SockAddr::try_init(|storage, len| {
            let sll = &mut *storage.cast::<libc::sockaddr_ll>();
            sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
            sll.sll_protocol = protocol_be;
            sll.sll_ifindex = ifindex as libc::c_int;
            *len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
            Ok(())
        })
    }?;
    Ok(addr)
}
