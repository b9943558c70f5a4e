//! Line transport tests: ordering, one line per response, no interleaving

mod common;

use std::sync::Arc;

use computer_use_mcp::{
    model::Response,
    wire::{ProtocolWriter, serve_lines},
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    sync::Mutex,
};

use crate::common::{RecordingSink, TestServer};

const PRODUCERS: usize = 8;
const REQUESTS_PER_PRODUCER: usize = 25;

fn request_line(producer: usize, seq: usize) -> (String, String) {
    let id = format!("p{}-{}", producer, seq);
    let line = match seq % 4 {
        0 => json!({"request_id": id, "tool_name": "mouse_move", "arguments": {"x": seq, "y": producer}}),
        1 => json!({"request_id": id, "tool_name": "get_cursor_position"}),
        2 => json!({"request_id": id, "tool_name": "keyboard_press", "arguments": {"key": "tab"}}),
        _ => json!({"request_id": id, "tool_name": "mouse_left_click", "arguments": {"x": "oops"}}),
    };
    (id, format!("{}\n", line))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_responses_follow_receipt_order() {
    let server = TestServer::quiet();
    let sink = RecordingSink::default();
    let writer = Arc::new(ProtocolWriter::new(sink.clone()));

    let (client, server_end) = tokio::io::duplex(4096);
    let dispatcher = server.dispatcher.clone();
    let serve_writer = writer.clone();
    let serving = tokio::spawn(async move {
        serve_lines(&dispatcher, BufReader::new(server_end), &serve_writer).await
    });

    // Producers share the input stream; the lock makes each line atomic and
    // records the order in which lines were actually sent.
    let input = Arc::new(Mutex::new((client, Vec::<String>::new())));
    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let input = input.clone();
        producers.push(tokio::spawn(async move {
            for seq in 0..REQUESTS_PER_PRODUCER {
                let (id, line) = request_line(producer, seq);
                let mut guard = input.lock().await;
                let (stream, sent) = &mut *guard;
                stream.write_all(line.as_bytes()).await.unwrap();
                sent.push(id);
                drop(guard);
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let (mut client, sent) = Arc::try_unwrap(input)
        .map_err(|_| "input still shared")
        .unwrap()
        .into_inner();
    client.shutdown().await.unwrap();
    drop(client);

    let stats = serving.await.unwrap().unwrap();
    assert_eq!(stats.requests as usize, PRODUCERS * REQUESTS_PER_PRODUCER);
    let invalid_per_producer = (0..REQUESTS_PER_PRODUCER).filter(|seq| seq % 4 == 3).count();
    assert_eq!(stats.failures as usize, PRODUCERS * invalid_per_producer);

    let received: Vec<String> = sink
        .json_lines()
        .iter()
        .map(|envelope| envelope["request_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(received, sent);

    // One write call per response, each a single complete line.
    let chunks = sink.chunks();
    assert_eq!(chunks.len(), sent.len());
    for chunk in chunks {
        assert_eq!(chunk.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(chunk.last(), Some(&b'\n'));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_writer_never_interleaves_lines() {
    // Tiny partial writes force write_all through many poll_write calls.
    let sink = RecordingSink::with_max_write(7);
    let writer = Arc::new(ProtocolWriter::new(sink.clone()));

    let mut tasks = Vec::new();
    for task in 0..16 {
        let writer = writer.clone();
        tasks.push(tokio::spawn(async move {
            for seq in 0..20 {
                let payload = json!({"task": task, "seq": seq, "pad": "x".repeat(task * 10)});
                let response = Response::success(
                    json!(format!("{}-{}", task, seq)),
                    computer_use_mcp::model::ToolOutput::Json(payload),
                );
                writer.write_response(&response).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let lines = sink.json_lines();
    assert_eq!(lines.len(), 16 * 20);
    for line in &lines {
        let id = line["request_id"].as_str().unwrap();
        let payload = &line["payload"];
        assert_eq!(
            id,
            format!("{}-{}", payload["task"], payload["seq"]),
            "payload does not belong to its envelope"
        );
    }

    // Per-task order is preserved.
    for task in 0..16 {
        let seqs: Vec<u64> = lines
            .iter()
            .filter(|line| line["payload"]["task"] == task)
            .map(|line| line["payload"]["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_malformed_lines_get_responses() {
    let server = TestServer::quiet();
    let sink = RecordingSink::default();
    let writer = ProtocolWriter::new(sink.clone());
    let input = concat!(
        "not json\n",
        "[1, 2, 3]\n",
        "{\"request_id\": 5, \"tool_name\": \"mouse_move\", \"arguments\": [1]}\n",
        "   \n",
        "{\"request_id\": 6, \"tool_name\": \"get_cursor_position\", \"arguments\": null}\n",
    );

    let stats = serve_lines(&server.dispatcher, BufReader::new(input.as_bytes()), &writer)
        .await
        .unwrap();
    assert_eq!(stats.requests, 4);
    assert_eq!(stats.failures, 3);

    let lines = sink.json_lines();
    let kinds: Vec<Value> = lines
        .iter()
        .map(|line| line["error_detail"]["kind"].clone())
        .collect();
    assert_eq!(
        kinds,
        vec![
            json!("ProtocolError"),
            json!("ProtocolError"),
            json!("ProtocolError"),
            Value::Null,
        ]
    );
    assert_eq!(lines[2]["request_id"], 5);
    assert_eq!(lines[3]["status"], "success");
}

#[tokio::test]
async fn test_invalid_utf8_line_is_rejected_alone() {
    let server = TestServer::quiet();
    let sink = RecordingSink::default();
    let writer = ProtocolWriter::new(sink.clone());

    let mut input = Vec::new();
    input.extend_from_slice(b"{\"request_id\": 1, \"tool_name\": \"get_cursor_position\"}\n");
    input.extend_from_slice(b"{\"request_id\": \"\xff\xfe\", \"tool_name\": \"mouse_move\"}\n");
    input.extend_from_slice(b"{\"request_id\": 3, \"tool_name\": \"get_cursor_position\"}\n");

    let stats = serve_lines(&server.dispatcher, BufReader::new(&input[..]), &writer)
        .await
        .expect("a bad line must not end the session");
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.failures, 1);

    let lines = sink.json_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["status"], "success");
    assert_eq!(lines[1]["request_id"], Value::Null);
    assert_eq!(lines[1]["error_detail"]["kind"], "ProtocolError");
    assert_eq!(lines[2]["request_id"], 3);
    assert_eq!(lines[2]["status"], "success");
    assert_eq!(server.desktop.calls().len(), 2);
}
