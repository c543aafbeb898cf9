pub mod protocol;
pub use protocol::*;

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serialport::SerialPort;

use crate::error::{ConsoleError, Result};
use crate::telemetry::LineAssembler;

pub const DEFAULT_BAUD: u32 = 9600;
pub const READ_TIMEOUT: Duration = Duration::from_millis(10);
const MAX_READS_PER_POLL: usize = 64;

/// Write half of the serial link.
///
/// Every frame goes out under one lock hold, so concurrent senders can never
/// interleave bytes of two frames. Clones share the same writer.
pub struct SerialLink<W: Write + Send>{
    writer: Arc<Mutex<Option<W>>>,
    format: FrameFormat,
}

impl<W: Write + Send> Clone for SerialLink<W>{
    fn clone(&self) -> Self{
        SerialLink{
            writer: Arc::clone(&self.writer),
            format: self.format,
        }
    }
}

impl<W: Write + Send> SerialLink<W>{
    pub fn new(writer: W) -> Self{
        SerialLink{
            writer: Arc::new(Mutex::new(Some(writer))),
            format: FrameFormat::default(),
        }
    }

    /// A link with no port behind it; every send fails.
    pub fn disconnected() -> Self{
        SerialLink{
            writer: Arc::new(Mutex::new(None)),
            format: FrameFormat::default(),
        }
    }

    pub fn with_format(mut self, format: FrameFormat) -> Self{
        self.format = format;
        self
    }

    pub fn format(&self) -> FrameFormat{
        self.format
    }

    pub fn is_open(&self) -> bool{
        self.lock().is_some()
    }

    pub fn send_command(&self, cmd: &ThrusterCommand) -> Result<()>{
        let frame = cmd.encode(self.format);
        self.send_raw(&frame)
    }

    pub fn send_raw(&self, frame: &[u8]) -> Result<()>{
        let mut guard = self.lock();
        let writer = guard.as_mut().ok_or_else(|| {
            ConsoleError::SerialWrite(io::Error::new(
                io::ErrorKind::NotConnected,
                "serial link is closed",
            ))
        })?;

        writer.write_all(frame).map_err(ConsoleError::SerialWrite)?;
        writer.flush().map_err(ConsoleError::SerialWrite)?;
        Ok(())
    }

    /// Drops the writer. Later sends fail fast with `NotConnected`.
    pub fn close(&self){
        if self.lock().take().is_some(){
            info!("[SERIAL] link closed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<W>>{
        //a panicked writer thread leaves the port itself usable
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read half of the serial link: turns a byte stream into telemetry lines.
pub struct TelemetryReader<R: Read>{
    reader: R,
    assembler: LineAssembler,
    read_buf: [u8; 256],
}

impl<R: Read> TelemetryReader<R>{
    pub fn new(reader: R) -> Self{
        TelemetryReader{
            reader,
            assembler: LineAssembler::new(),
            read_buf: [0u8; 256],
        }
    }

    /// Reads what is available right now and returns every completed line.
    /// A read timeout just means no bytes yet.
    pub fn poll_lines(&mut self) -> io::Result<Vec<Vec<u8>>>{
        //keep reading while the buffer comes back full so a backlog drains
        //in one tick, up to MAX_READS_PER_POLL reads
        for _ in 0..MAX_READS_PER_POLL{
            match self.reader.read(&mut self.read_buf){
                Ok(0) => break,
                Ok(n) =>{
                    self.assembler.extend(&self.read_buf[..n]);
                    if n < self.read_buf.len(){
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        let mut lines = Vec::new();
        while let Some(line) = self.assembler.next_line(){
            lines.push(line);
        }
        Ok(lines)
    }
}

pub type PortLink = SerialLink<Box<dyn SerialPort>>;
pub type PortReader = TelemetryReader<Box<dyn SerialPort>>;

/// Opens the port and splits it into a command link and a telemetry reader.
pub fn open_serial(port_name: &str, baud_rate: u32) -> Result<(PortLink, PortReader)>{
    info!("[SERIAL] opening {} at {} baud", port_name, baud_rate);

    let open_err = |source: serialport::Error| ConsoleError::SerialOpen{ port: port_name.to_string(), source };

    let port = serialport::new(port_name, baud_rate)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(open_err)?;
    let reader = port.try_clone().map_err(open_err)?;

    debug!("[SERIAL] {} ready", port_name);
    Ok((SerialLink::new(port), TelemetryReader::new(reader)))
}

/// Lists ports so the operator can pick one when the default is wrong.
pub fn available_ports() -> Vec<String>{
    match serialport::available_ports(){
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) =>{
            warn!("[SERIAL] could not enumerate ports: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests{
    use super::*;
    use std::collections::VecDeque;
    use std::thread;

    /// Shared in-memory port stand-in.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf{
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>{
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()>{
            Ok(())
        }
    }

    impl SharedBuf{
        pub(crate) fn contents(&self) -> Vec<u8>{
            self.0.lock().unwrap().clone()
        }
    }

    struct BrokenPort;

    impl Write for BrokenPort{
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize>{
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()>{
            Ok(())
        }
    }

    /// Hands out one scripted chunk per read, then times out.
    pub(crate) struct ChunkedReader{
        pub(crate) chunks: VecDeque<Vec<u8>>,
    }

    impl Read for ChunkedReader{
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>{
            match self.chunks.pop_front(){
                Some(chunk) =>{
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            }
        }
    }

    #[test]
    fn test_send_command_writes_frame(){
        let buf = SharedBuf::default();
        let link = SerialLink::new(buf.clone()).with_format(FrameFormat::Legacy);
        link.send_command(&ThrusterCommand::neutral()).unwrap();
        assert_eq!(buf.contents(), b"150015001500150015001500/".to_vec());
    }

    #[test]
    fn test_closed_link_fails_fast(){
        let link = SerialLink::new(SharedBuf::default());
        assert!(link.is_open());
        link.close();
        assert!(!link.is_open());

        match link.send_command(&ThrusterCommand::neutral()){
            Err(ConsoleError::SerialWrite(e)) => assert_eq!(e.kind(), io::ErrorKind::NotConnected),
            other => panic!("expected SerialWrite, got {:?}", other),
        }

        let never_opened: SerialLink<SharedBuf> = SerialLink::disconnected();
        assert!(never_opened.send_command(&ThrusterCommand::neutral()).is_err());
    }

    #[test]
    fn test_write_error_is_reported(){
        let link = SerialLink::new(BrokenPort);
        assert!(matches!(
            link.send_command(&ThrusterCommand::neutral()),
            Err(ConsoleError::SerialWrite(_))
        ));
    }

    #[test]
    fn test_concurrent_senders_never_interleave(){
        let buf = SharedBuf::default();
        let link = SerialLink::new(buf.clone());

        let handles: Vec<_> = (0..4).map(|t|{
            let link = link.clone();
            thread::spawn(move ||{
                let cmd = ThrusterCommand::new([1100 + t * 100; THRUSTER_COUNT]);
                for _ in 0..50{
                    link.send_command(&cmd).unwrap();
                }
            })
        }).collect();
        for h in handles{
            h.join().unwrap();
        }

        let bytes = buf.contents();
        assert_eq!(bytes.len(), 200 * CHECKED_FRAME_SIZE);
        for frame in bytes.chunks_exact(CHECKED_FRAME_SIZE){
            let cmd = ThrusterCommand::decode(frame).unwrap();
            assert!(cmd.pwm.iter().all(|&v| v == cmd.pwm[0]));
        }
    }

    #[test]
    fn test_reader_joins_split_lines(){
        let reader = ChunkedReader{
            chunks: VecDeque::from(vec![
                b"7.20/25.5".to_vec(),
                b"0/101.30/80/\r\n6.9".to_vec(),
            ]),
        };
        let mut telemetry = TelemetryReader::new(reader);

        assert!(telemetry.poll_lines().unwrap().is_empty());
        let lines = telemetry.poll_lines().unwrap();
        assert_eq!(lines, vec![b"7.20/25.50/101.30/80/\r".to_vec()]);
        //timeout with nothing buffered
        assert!(telemetry.poll_lines().unwrap().is_empty());
    }

    #[test]
    fn test_reader_drains_backlog_in_one_poll(){
        let line = b"7.20/25.50/101.30/80/\n";
        let backlog: Vec<u8> = line.iter().copied().cycle().take(line.len() * 100).collect();
        assert!(backlog.len() > 256 * 4);

        let mut telemetry = TelemetryReader::new(io::Cursor::new(backlog));
        let lines = telemetry.poll_lines().unwrap();
        assert_eq!(lines.len(), 100);
        assert!(lines.iter().all(|l| l.as_slice() == &line[..line.len() - 1]));
        assert!(telemetry.poll_lines().unwrap().is_empty());
    }
}
