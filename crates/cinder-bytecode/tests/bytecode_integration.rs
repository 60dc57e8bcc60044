//! Integration tests for assembling, verifying and encoding modules

use cinder_bytecode::{
    disassemble, verify_module, BinaryOp, Chunk, ChunkError, CompiledModule, DecodeError, Export,
    ExportKind, FunctionProto, Instruction, LabelAllocator, StaticPool, Target, VerifyError,
};
use pretty_assertions::assert_eq;

/// `let i = 0; while (i < 3) i = i + 1; return i;` over stack slot 0.
fn counting_loop(labels: &mut LabelAllocator) -> Chunk {
    let (top, exit) = (labels.make(), labels.make());
    let mut chunk = Chunk::new();
    chunk.emit(Instruction::LoadInt { dst: 0, value: 0 });
    chunk.emit(Instruction::Push { src: 0 });
    chunk.place(top);
    chunk.emit(Instruction::LoadStack { dst: 0, slot: 0 });
    chunk.emit(Instruction::LoadInt { dst: 1, value: 3 });
    chunk.emit(Instruction::Binary {
        op: BinaryOp::Lt,
        dst: 1,
        lhs: 0,
        rhs: 1,
    });
    chunk.emit(Instruction::JumpIfFalse {
        cond: 1,
        target: Target::Label(exit),
    });
    chunk.emit(Instruction::LoadInt { dst: 1, value: 1 });
    chunk.emit(Instruction::Binary {
        op: BinaryOp::Add,
        dst: 0,
        lhs: 0,
        rhs: 1,
    });
    chunk.emit(Instruction::StoreStack { slot: 0, src: 0 });
    chunk.emit(Instruction::Jump {
        target: Target::Label(top),
    });
    chunk.place(exit);
    chunk.emit(Instruction::LoadStack { dst: 0, slot: 0 });
    chunk.emit(Instruction::Pop { count: 1 });
    chunk.emit(Instruction::Return { src: 0 });
    chunk
}

fn module_with(main: Chunk, labels: &LabelAllocator) -> CompiledModule {
    let mut statics = StaticPool::new();
    statics.add_string("count");
    CompiledModule {
        name: "counter".to_string(),
        main: FunctionProto {
            name: "<main>".to_string(),
            param_count: 0,
            register_count: 2,
            max_stack: 1,
            is_method: false,
            code: main.finalize(labels.generation()).expect("labels resolve"),
        },
        functions: Vec::new(),
        statics,
        globals: vec!["count".to_string()],
        exports: vec![Export {
            name: "count".to_string(),
            kind: ExportKind::Variable,
            index: 0,
        }],
        imports: Vec::new(),
    }
}

#[test]
fn test_assemble_verify_encode() {
    let mut labels = LabelAllocator::new();
    let chunk = counting_loop(&mut labels);

    let module = module_with(chunk, &labels);
    verify_module(&module).expect("valid module");
    assert_eq!(
        module.main.code.code[5],
        Instruction::JumpIfFalse {
            cond: 1,
            target: Target::Offset(10)
        }
    );

    let bytes = module.encode();
    let decoded = CompiledModule::decode(&bytes).expect("decodes");
    assert_eq!(decoded, module);
}

#[test]
fn test_corrupted_payload_is_rejected() {
    let mut labels = LabelAllocator::new();
    let module = module_with(counting_loop(&mut labels), &labels);
    let mut bytes = module.encode();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    assert!(matches!(
        CompiledModule::decode(&bytes),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_labels_from_previous_compile_are_stale() {
    let stale = LabelAllocator::new().make();
    let labels = LabelAllocator::new();

    let mut chunk = Chunk::new();
    chunk.emit(Instruction::Jump {
        target: Target::Label(stale),
    });
    chunk.place(stale);
    chunk.emit(Instruction::ReturnNull);

    assert!(matches!(
        chunk.finalize(labels.generation()),
        Err(ChunkError::StaleLabel { .. })
    ));
}

#[test]
fn test_register_out_of_frame_fails_verification() {
    let mut labels = LabelAllocator::new();
    let mut module = module_with(counting_loop(&mut labels), &labels);
    module.main.register_count = 1;
    assert!(matches!(
        verify_module(&module),
        Err(VerifyError::InvalidRegister { register: 1, .. })
    ));
}

#[test]
fn test_json_dump_and_disassembly() {
    let mut labels = LabelAllocator::new();
    let module = module_with(counting_loop(&mut labels), &labels);

    let json = serde_json::to_string(&module).expect("serializes");
    let back: CompiledModule = serde_json::from_str(&json).expect("deserializes");
    assert_eq!(back, module);

    let text = disassemble(&module);
    assert!(text.contains("<main>"));
    assert!(text.contains("count"));
}
