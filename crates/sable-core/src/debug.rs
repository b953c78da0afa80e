use crate::{
    chunk::{Chunk, OpCode},
    memory::{ObjectHeap, ObjectKind},
};

#[allow(dead_code)]
pub fn disassemble_chunk(chunk: &Chunk, heap: &ObjectHeap, name: &str) {
    println!("== {} ==", name);

    let mut offset = 0;

    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, heap, offset);
    }
}

pub fn disassemble_instruction(chunk: &Chunk, heap: &ObjectHeap, offset: usize) -> usize {
    print!("{:04} ", offset);

    if offset > 0 && chunk.locs[offset].line == chunk.locs[offset - 1].line {
        print!("   | ");
    } else {
        print!("{:04} ", chunk.locs[offset].line);
    }

    let instruction = chunk.code[offset];
    let opcode = OpCode::from(instruction);

    match opcode {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, heap, offset),
        OpCode::Nil => simple_instruction("OP_NIL", offset),
        OpCode::True => simple_instruction("OP_TRUE", offset),
        OpCode::False => simple_instruction("OP_FALSE", offset),
        OpCode::Pop => simple_instruction("OP_POP", offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset),
        OpCode::GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, offset),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, heap, offset),
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, heap, offset),
        OpCode::DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, heap, offset),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset),
        OpCode::Greater => simple_instruction("OP_GREATER", offset),
        OpCode::Less => simple_instruction("OP_LESS", offset),
        OpCode::Add => simple_instruction("OP_ADD", offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset),
        OpCode::Not => simple_instruction("OP_NOT", offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset),
        OpCode::Print => simple_instruction("OP_PRINT", offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, offset),
        OpCode::Closure => {
            let mut offset = offset + 1;
            let constant = chunk.code[offset];
            offset += 1;

            print!("{:<16} {:4} '", "OP_CLOSURE", constant);
            let value = chunk.constants[constant as usize];
            println!("{}'", value.to_display_string(heap));

            let function = value.as_object().and_then(|handle| {
                match &heap.get(handle).kind {
                    ObjectKind::Function(function) => Some(function),
                    _ => None,
                }
            });

            if let Some(function) = function {
                for _ in 0..function.upvalue_count {
                    let is_local = chunk.code[offset];
                    offset += 1;
                    let index = chunk.code[offset];
                    offset += 1;

                    println!(
                        "{:04}      |                     {} {}",
                        offset - 2,
                        if is_local != 0 { "local" } else { "upvalue" },
                        index
                    );
                }
            }

            offset
        }
        OpCode::CloseUpvalue => simple_instruction("OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction("OP_RETURN", offset),
        OpCode::Class => constant_instruction("OP_CLASS", chunk, heap, offset),
        OpCode::Method => constant_instruction("OP_METHOD", chunk, heap, offset),
        OpCode::Inherit => simple_instruction("OP_INHERIT", offset),
        OpCode::GetProperty => constant_instruction("OP_GET_PROPERTY", chunk, heap, offset),
        OpCode::SetProperty => constant_instruction("OP_SET_PROPERTY", chunk, heap, offset),
        OpCode::GetSuper => constant_instruction("OP_GET_SUPER", chunk, heap, offset),
        OpCode::Invoke => invoke_instruction("OP_INVOKE", chunk, heap, offset),
        OpCode::SuperInvoke => invoke_instruction("OP_SUPER_INVOKE", chunk, heap, offset),
    }
}

fn simple_instruction(name: &str, offset: usize) -> usize {
    println!("{}", name);
    offset + 1
}

fn constant_instruction(name: &str, chunk: &Chunk, heap: &ObjectHeap, offset: usize) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    print!("{:<16} {:4} '", name, constant);

    match chunk.constants.get(constant) {
        Some(value) => print!("{}", value.to_display_string(heap)),
        None => print!("??"),
    }

    println!("'");
    offset + 2
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    println!("{:<16} {:4}", name, slot);
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as u16) << 8) | (chunk.code[offset + 2] as u16);
    let target = offset as i32 + 3 + sign * (jump as i32);
    println!("{:<16} {:4} -> {}", name, offset, target);
    offset + 3
}

fn invoke_instruction(name: &str, chunk: &Chunk, heap: &ObjectHeap, offset: usize) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    print!("{:<16} ({} args) {:4} '", name, arg_count, constant);

    match chunk.constants.get(constant) {
        Some(value) => print!("{}", value.to_display_string(heap)),
        None => print!("??"),
    }

    println!("'");
    offset + 3
}

/// Dumps every function currently on the heap, chunk by chunk.
#[allow(dead_code)]
pub fn disassemble_program(heap: &ObjectHeap) {
    println!("=== PROGRAM DISASSEMBLY ===");
    println!();

    let mut function_count = 0;

    for (handle, object) in heap.iter_objects() {
        let ObjectKind::Function(function) = &object.kind else {
            continue;
        };
        function_count += 1;

        let name = heap.function_display_name(function);
        println!("Function #{} (object {}) - {}:", function_count, handle, name);
        println!("  Arity: {}", function.arity);
        disassemble_chunk(&function.chunk, heap, &name);
        println!();
    }

    if function_count == 0 {
        println!("No functions found in the program.");
    } else {
        println!("=== END PROGRAM DISASSEMBLY ({} functions) ===", function_count);
    }
}

#[macro_export]
macro_rules! debug_log {
    ($is_debug:expr, $($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        {
            if $is_debug {
                println!($($arg)*);
            }
        }
    }};
}
