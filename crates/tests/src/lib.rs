//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 归档文件 → Dispatcher → 内存通道的 e2e 测试
//! - 真实 TCP 往返测试

#[cfg(test)]
mod contract_tests {
    use contracts::{wire, SystemId, SYSTEMS};

    #[test]
    fn test_system_target_order() {
        let ids: Vec<u16> = SYSTEMS.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![0x20, 0x10, 0x30, 0x50, 0x40, 0x60, 0x80, 0x90]);
        assert_eq!(SystemId::parse("0x60").and_then(SystemId::position), Some(5));
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(wire::FIRST_INDEX_REQUEST, "SendFirstTimesliceIndex");
        assert_eq!(wire::STOP_COMMAND, "STOP");
        assert_eq!(wire::eof_command(41, 42), "EOF 41 42");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{wire, Block, InputSpec, SplitMode, Timeslice};
    use dispatcher::{
        serve, CommandChannel, DispatchState, Dispatcher, MemoryChannel, MemoryRequestChannel,
        MonitorPublisher, ServeOutcome,
    };
    use ingestion::{make_timeslice, write_archive, Ingestor, SourceAdapter};
    use observability::PublishSchedule;
    use split_engine::SplitEngine;

    const STS: u16 = 0x10;
    const TOF: u16 = 0x60;

    /// Archive → Dispatcher → memory channels
    struct Run {
        dispatcher: Dispatcher<SourceAdapter>,
        missed: MemoryChannel,
        commands: MemoryChannel,
        _dir: tempfile::TempDir,
    }

    impl Run {
        async fn new(indices: &[u64], mode: SplitMode, blocks: Vec<Block>, hwm: usize) -> Self {
            Self::with_publisher(indices, mode, blocks, hwm, None).await
        }

        async fn with_publisher(
            indices: &[u64],
            mode: SplitMode,
            blocks: Vec<Block>,
            hwm: usize,
            publisher: Option<MonitorPublisher>,
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("run.tsa");
            let timeslices: Vec<_> = indices
                .iter()
                .map(|&i| make_timeslice(i, &[STS, TOF]))
                .collect();
            write_archive(&path, &timeslices).await.unwrap();

            let source = source_for(&path);
            let mut ingestor = Ingestor::new(source, None);
            if publisher.is_some() {
                ingestor = ingestor.with_monitoring("_e2e");
            }

            let missed = MemoryChannel::new("missed");
            let commands = MemoryChannel::new("commands");
            let signals = CommandChannel::new(
                Some(missed.clone().into()),
                Some(commands.clone().into()),
                Duration::ZERO,
                Duration::ZERO,
            );

            Self {
                dispatcher: Dispatcher::new(
                    ingestor,
                    SplitEngine::new(mode, blocks, hwm),
                    signals,
                    publisher,
                ),
                missed,
                commands,
                _dir: dir,
            }
        }

        async fn serve(&mut self, requests: &[&'static str]) -> (ServeOutcome, Vec<Option<Bytes>>) {
            let mut channel = MemoryRequestChannel::new("ts-request", requests.iter().copied());
            let outcome = serve(&mut self.dispatcher, &mut channel, std::future::pending()).await;
            (outcome, channel.outcomes().to_vec())
        }

        fn commands(&self) -> Vec<String> {
            self.commands
                .messages()
                .iter()
                .map(|parts| wire::decode_string(&parts[0]).unwrap())
                .collect()
        }

        fn missed(&self) -> Vec<u64> {
            self.missed
                .messages()
                .iter()
                .flat_map(|parts| wire::decode_indices(&parts[0]).unwrap())
                .collect()
        }
    }

    fn source_for(path: &Path) -> SourceAdapter {
        SourceAdapter::from_input(&InputSpec::File {
            path: path.display().to_string(),
        })
        .unwrap()
    }

    fn timeslice(reply: &Option<Bytes>) -> Timeslice {
        wire::decode_timeslice(reply.as_ref().unwrap()).unwrap()
    }

    fn systems(ts: &Timeslice) -> Vec<u16> {
        ts.components.iter().filter_map(|c| c.system_id()).collect()
    }

    fn block(name: &str, systems: &[u16]) -> Block {
        Block {
            name: name.to_string(),
            systems: systems.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[tokio::test]
    async fn test_no_split_from_archive() {
        let mut run = Run::new(&[0, 1, 2, 5, 6], SplitMode::NoSplit, Vec::new(), 1).await;

        let (outcome, replies) = run
            .serve(&[
                wire::FIRST_INDEX_REQUEST,
                "ts",
                "ts",
                "ts",
                "ts",
                "ts",
                "ts",
                "ts",
            ])
            .await;

        assert_eq!(outcome, ServeOutcome::ChannelClosed);
        assert_eq!(wire::decode_string(replies[0].as_ref().unwrap()).unwrap(), "0");

        let indices: Vec<u64> = replies[1..6].iter().map(|r| timeslice(r).index).collect();
        assert_eq!(indices, vec![0, 1, 2, 5, 6]);
        // full timeslices keep every component
        assert_eq!(systems(&timeslice(&replies[1])), vec![STS, TOF]);

        // exhausted: no reply for the remaining requests
        assert!(replies[6..].iter().all(Option::is_none));

        assert_eq!(run.missed(), vec![3, 4]);
        assert_eq!(run.commands(), vec!["EOF 6 5"]);
        assert_eq!(run.dispatcher.state(), DispatchState::StreamExhausted);
        assert_eq!(run.dispatcher.message_counter(), 6);

        let summary = run.dispatcher.summary();
        assert_eq!(summary.total_timeslices, 5);
        assert_eq!(summary.total_missed, 2);
        assert_eq!(summary.requests_ignored, 2);
    }

    #[tokio::test]
    async fn test_first_index_of_late_start() {
        let mut run = Run::new(&[7, 8], SplitMode::PerSystem, Vec::new(), 2).await;

        let (_, replies) = run
            .serve(&[wire::FIRST_INDEX_REQUEST, wire::FIRST_INDEX_REQUEST, "STS"])
            .await;

        let first: Vec<String> = replies[..2]
            .iter()
            .map(|r| wire::decode_string(r.as_ref().unwrap()).unwrap())
            .collect();
        assert_eq!(first, vec!["7", "7"]);
        // the prefetched timeslice is served, not skipped
        assert_eq!(timeslice(&replies[2]).index, 7);
        // a run starting late reports a synthetic 0 before the gap
        assert_eq!(run.missed(), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_per_system_serves_each_entry_once() {
        let mut run = Run::new(&[0, 1, 2], SplitMode::PerSystem, Vec::new(), 2).await;

        let (_, replies) = run.serve(&["STS", "TOF", "STS", "0x60", "sts"]).await;

        let served: Vec<(u64, Vec<u16>)> = replies
            .iter()
            .map(|r| {
                let ts = timeslice(r);
                (ts.index, systems(&ts))
            })
            .collect();
        assert_eq!(
            served,
            vec![
                (0, vec![STS]),
                (0, vec![TOF]),
                (1, vec![STS]),
                (1, vec![TOF]),
                (2, vec![STS]),
            ]
        );
        assert!(run.dispatcher.engine().buffer().len() <= 2);
    }

    #[tokio::test]
    async fn test_eviction_then_refetch() {
        let mut run = Run::new(&[0, 1, 2], SplitMode::PerSystem, Vec::new(), 1).await;

        let (_, replies) = run.serve(&["STS", "STS", "TOF"]).await;

        let indices: Vec<u64> = replies.iter().map(|r| timeslice(r).index).collect();
        // entry 0 was evicted before TOF asked for it
        assert_eq!(indices, vec![0, 1, 1]);
        assert_eq!(run.dispatcher.engine().buffer().evicted_count(), 1);
    }

    #[tokio::test]
    async fn test_per_block_and_unknown_block_stops() {
        let blocks = vec![block("tracking", &[STS, 0x20]), block("pid", &[TOF])];
        let mut run = Run::new(&[0, 1], SplitMode::PerBlock, blocks, 2).await;

        let (outcome, replies) = run.serve(&["tracking", "pid\0", "MVD", "pid"]).await;

        assert_eq!(outcome, ServeOutcome::Stopped);
        assert_eq!(systems(&timeslice(&replies[0])), vec![STS]);
        assert_eq!(systems(&timeslice(&replies[1])), vec![TOF]);
        // unknown name: no reply, STOP issued, remaining requests untouched
        assert_eq!(replies.len(), 3);
        assert!(replies[2].is_none());
        assert_eq!(run.commands(), vec!["STOP"]);
    }

    #[tokio::test]
    async fn test_mode_precedence_no_split_wins() {
        let settings = ConfigLoader::load_from_str(
            r#"
[input]
filename = "unused.tsa"

[split]
no_split = true
per_block = true
blocks = ["pid:0x60"]

[[channels.endpoints]]
name = "ts-request"
address = "127.0.0.1:0"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(settings.mode, SplitMode::NoSplit);
        assert!(!settings.warnings.is_empty());

        let mut run = Run::new(&[0], settings.mode, settings.blocks.clone(), 1).await;
        let (_, replies) = run.serve(&["pid"]).await;
        assert_eq!(systems(&timeslice(&replies[0])), vec![STS, TOF]);
    }

    #[tokio::test]
    async fn test_failed_reply_stops_run() {
        let mut run = Run::new(&[0, 1], SplitMode::NoSplit, Vec::new(), 1).await;

        let mut channel = MemoryRequestChannel::new("ts-request", ["a", "b"]);
        channel.set_failing(true);
        let outcome = serve(&mut run.dispatcher, &mut channel, std::future::pending()).await;

        assert_eq!(outcome, ServeOutcome::Stopped);
        assert_eq!(run.commands(), vec!["STOP"]);
        assert_eq!(run.dispatcher.summary().replies_failed, 1);
    }

    #[tokio::test]
    async fn test_monitoring_publishes_config_then_data() {
        let metrics = MemoryChannel::new("histos");
        let Some(start) = Instant::now().checked_sub(Duration::from_secs(1)) else {
            return;
        };
        let schedule = PublishSchedule::starting_at(1, Duration::ZERO, Duration::from_secs(10), start);
        let publisher = MonitorPublisher::with_schedule(metrics.clone().into(), schedule);

        let mut run =
            Run::with_publisher(&[0, 1, 2], SplitMode::NoSplit, Vec::new(), 1, Some(publisher))
                .await;
        run.serve(&["ts", "ts"]).await;

        let messages = metrics.messages();
        assert_eq!(messages.len(), 2);
        // header, 6 histograms, 1 canvas, data
        assert_eq!(messages[0].len(), 9);
        let (name, folder): (String, String) = wire::decode(&messages[0][1]).unwrap();
        assert_eq!(name, "TsRate_e2e");
        assert_eq!(folder, "Sampler_e2e");
        assert_eq!(messages[1].len(), 1);
        assert_eq!(run.dispatcher.publisher().unwrap().published(), 2);
    }
}

#[cfg(test)]
mod tcp_tests {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::wire;
    use dispatcher::{serve, Dispatcher, ServeOutcome, TcpRequestChannel};
    use ingestion::{make_timeslice, write_archive, SourceAdapter};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    async fn request(stream: &mut TcpStream, payload: &str) -> Option<Bytes> {
        wire::write_frame(stream, payload.as_bytes()).await.ok()?;
        wire::read_frame(stream).await.ok().flatten()
    }

    fn config(archive: &str, commands: SocketAddr) -> String {
        format!(
            r#"
[input]
filename = "{archive}"

[split]
per_system = true

[buffer]
high_water_mark = 2

[channels]
commands = "cmd"

[[channels.endpoints]]
name = "ts-request"
address = "tcp://127.0.0.1:0"

[[channels.endpoints]]
name = "cmd"
address = "{commands}"

[shutdown]
stop_grace_ms = 0
eof_grace_ms = 0
"#
        )
    }

    /// Two consumers over real sockets, EOF on the command channel
    #[tokio::test]
    async fn test_tcp_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("run.tsa");
        let timeslices = vec![make_timeslice(0, &[0x10, 0x60]), make_timeslice(1, &[0x10, 0x60])];
        write_archive(&archive, &timeslices).await.unwrap();

        let command_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let command_addr = command_listener.local_addr().unwrap();
        let command_reader = tokio::spawn(async move {
            let (mut stream, _) = command_listener.accept().await.unwrap();
            let parts = wire::read_multipart(&mut stream).await.unwrap().unwrap();
            wire::decode_string(&parts[0]).unwrap()
        });

        let settings = ConfigLoader::load_from_str(
            &config(&archive.display().to_string(), command_addr),
            ConfigFormat::Toml,
        )
        .unwrap();

        let request_binding = &settings.channels.request;
        let mut channel = TcpRequestChannel::bind(request_binding.name.clone(), &request_binding.address)
            .await
            .unwrap();
        let addr = channel.local_addr();

        let source = SourceAdapter::from_input(&settings.input).unwrap();
        let mut dispatcher = Dispatcher::from_settings(source, &settings);

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let consumers = tokio::spawn(async move {
            let mut sts = TcpStream::connect(addr).await.unwrap();
            let first = request(&mut sts, wire::FIRST_INDEX_REQUEST).await;
            let sts_0 = request(&mut sts, "STS").await;

            let mut tof = TcpStream::connect(addr).await.unwrap();
            let tof_0 = request(&mut tof, "TOF").await;
            let tof_1 = request(&mut tof, "TOF").await;
            // stream exhausted: the connection is closed without a reply
            let tof_end = request(&mut tof, "TOF").await;

            let _ = done_tx.send(());
            (first, sts_0, tof_0, tof_1, tof_end)
        });

        let outcome = serve(&mut dispatcher, &mut channel, async {
            let _ = done_rx.await;
        })
        .await;
        assert_eq!(outcome, ServeOutcome::Interrupted);

        let (first, sts_0, tof_0, tof_1, tof_end) = consumers.await.unwrap();
        assert_eq!(wire::decode_string(&first.unwrap()).unwrap(), "0");

        let sts_0 = wire::decode_timeslice(&sts_0.unwrap()).unwrap();
        assert_eq!(sts_0.index, 0);
        assert_eq!(sts_0.components[0].system_id(), Some(0x10));

        let tof_0 = wire::decode_timeslice(&tof_0.unwrap()).unwrap();
        let tof_1 = wire::decode_timeslice(&tof_1.unwrap()).unwrap();
        assert_eq!((tof_0.index, tof_1.index), (0, 1));
        assert!(tof_end.is_none());

        assert_eq!(command_reader.await.unwrap(), "EOF 1 2");
        assert_eq!(dispatcher.message_counter(), 4);
    }
}
